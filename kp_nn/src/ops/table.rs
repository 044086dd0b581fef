//! Validated neighbor tables on the tensor device.

use burn::prelude::*;
use burn::tensor::TensorData;

use kp_core::{validate_indices, NeighborRows};

use crate::error::{KpError, Result};

/// Fixed-width neighbor table whose indices are known to address either a
/// real support point or the shadow sentinel `support_len`.
///
/// The only way to obtain a table is through a validating constructor, so
/// every gather that pads its source with one neutral row stays in bounds.
/// A host copy of the indices is kept for the re-packing done by deformable
/// convolutions.
#[derive(Debug, Clone)]
pub struct NeighborTable<B: Backend> {
    indices: Tensor<B, 2, Int>,
    host: Vec<i64>,
    support_len: usize,
}

impl<B: Backend> NeighborTable<B> {
    /// Validate a device tensor of neighbor indices.
    ///
    /// # Arguments
    /// * `indices` - `[n_query, k]` indices into the support set
    /// * `support_len` - Number of real support points; `support_len` itself is the shadow index
    pub fn new(indices: Tensor<B, 2, Int>, support_len: usize) -> Result<Self> {
        let host = indices
            .to_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| KpError::InvalidData(format!("{e:?}")))?;

        Self::check(&host, indices.dims()[1], support_len)?;

        Ok(Self {
            indices,
            host,
            support_len,
        })
    }

    /// Validate row-major host indices and upload them.
    pub fn from_indices(
        host: Vec<i64>,
        width: usize,
        support_len: usize,
        device: &B::Device,
    ) -> Result<Self> {
        if width == 0 || host.len() % width != 0 {
            return Err(KpError::ShapeMismatch {
                expected: vec![host.len() / width.max(1), width],
                got: vec![host.len()],
            });
        }
        Self::check(&host, width, support_len)?;
        Ok(Self::upload(host, width, support_len, device))
    }

    /// Upload an Option-aware host table; shadow slots become the sentinel.
    pub fn from_rows(rows: &NeighborRows, device: &B::Device) -> Self {
        Self::upload(rows.to_indices(), rows.width(), rows.support_len(), device)
    }

    fn check(host: &[i64], width: usize, support_len: usize) -> Result<()> {
        if width == 0 {
            log::error!("neighbor table has no columns");
            return Err(KpError::InvalidData(
                "neighbor table must have at least one column".to_string(),
            ));
        }
        validate_indices(host, support_len).map_err(|e| {
            log::error!("rejecting neighbor table: {e}");
            match e {
                kp_core::KpCoreError::NeighborIndexOutOfBounds { index, table_size } => {
                    KpError::NeighborIndexOutOfBounds { index, table_size }
                }
                other => KpError::Core(other),
            }
        })
    }

    fn upload(host: Vec<i64>, width: usize, support_len: usize, device: &B::Device) -> Self {
        let rows = host.len() / width;
        let indices = Tensor::from_data(TensorData::new(host.clone(), [rows, width]), device);
        Self {
            indices,
            host,
            support_len,
        }
    }

    /// Index tensor `[n_query, k]`.
    pub fn indices(&self) -> Tensor<B, 2, Int> {
        self.indices.clone()
    }

    /// Row-major host copy of the indices.
    pub fn host_indices(&self) -> &[i64] {
        &self.host
    }

    /// Number of query rows.
    pub fn rows(&self) -> usize {
        self.indices.dims()[0]
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.indices.dims()[1]
    }

    /// Number of real support points.
    pub fn support_len(&self) -> usize {
        self.support_len
    }

    /// Shadow index.
    pub fn sentinel(&self) -> usize {
        self.support_len
    }

    /// First column, the nearest neighbor when rows are sorted by distance.
    pub fn nearest(&self) -> Tensor<B, 1, Int> {
        let rows = self.rows();
        self.indices.clone().narrow(1, 0, 1).reshape([rows])
    }

    /// Host view with explicit shadow slots.
    pub fn to_rows(&self) -> Result<NeighborRows> {
        Ok(NeighborRows::from_indices(
            &self.host,
            self.width(),
            self.support_len,
        )?)
    }

    /// Fail unless the table was built for a support set of `given` points.
    pub fn ensure_support(&self, given: usize) -> Result<()> {
        if given != self.support_len {
            return Err(KpError::SupportMismatch {
                table: self.support_len,
                given,
            });
        }
        Ok(())
    }

    /// Fail unless the table has one row per query point.
    pub fn ensure_queries(&self, queries: usize) -> Result<()> {
        if queries != self.rows() {
            return Err(KpError::QueryMismatch {
                rows: self.rows(),
                queries,
            });
        }
        Ok(())
    }
}
