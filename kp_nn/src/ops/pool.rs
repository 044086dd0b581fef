//! Pooling over neighbor tables and point segments.

use burn::prelude::*;

use super::gather::{gather_padded, gather_rows, pad_features};
use super::table::NeighborTable;
use crate::error::{KpError, Result};

/// Feature of the first (nearest) neighbor of every row.
///
/// Shadow first neighbors yield a zero row.
///
/// Input shape: x [support_len, d]
/// Output shape: [n_query, d]
pub fn closest_pool<B: Backend>(x: Tensor<B, 2>, table: &NeighborTable<B>) -> Result<Tensor<B, 2>> {
    table.ensure_support(x.dims()[0])?;
    Ok(gather_rows(pad_features(x), table.nearest()))
}

/// Element-wise maximum over the neighbors of every row.
///
/// Shadow slots contribute zeros.
///
/// Input shape: x [support_len, d]
/// Output shape: [n_query, d]
pub fn max_pool<B: Backend>(x: Tensor<B, 2>, table: &NeighborTable<B>) -> Result<Tensor<B, 2>> {
    let d = x.dims()[1];
    let gathered = gather_padded(x, table, 0.0)?;
    Ok(gathered.max_dim(1).reshape([table.rows(), d]))
}

/// Mean of contiguous row segments.
///
/// Input shape: x [n, d] with `lengths` summing to n
/// Output shape: [lengths.len(), d]
pub fn global_average<B: Backend>(x: Tensor<B, 2>, lengths: &[usize]) -> Result<Tensor<B, 2>> {
    let [n, _] = x.dims();
    let total: usize = lengths.iter().sum();
    if total != n || lengths.is_empty() {
        return Err(KpError::SegmentMismatch { total, rows: n });
    }
    if let Some(segment) = lengths.iter().position(|&len| len == 0) {
        return Err(KpError::EmptySegment { segment });
    }

    let mut start = 0;
    let means = lengths
        .iter()
        .map(|&len| {
            let mean = x.clone().narrow(0, start, len).mean_dim(0);
            start += len;
            mean
        })
        .collect();

    Ok(Tensor::cat(means, 0))
}
