//! Row gathers with shadow padding.

use burn::prelude::*;

use kp_core::SHADOW_COORDINATE;

use super::table::NeighborTable;
use crate::error::{KpError, Result};

/// Rows of `x` at each index.
///
/// No bounds check; callers pad `x` before gathering sentinel indices.
///
/// Input shapes: x [n, d], idx [m]
/// Output shape: [m, d]
pub fn gather_rows<B: Backend>(x: Tensor<B, 2>, idx: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    x.select(0, idx)
}

/// Rows of `x` for every entry of a 2-D index tensor.
///
/// Input shapes: x [n, d], idx [m, k]
/// Output shape: [m, k, d]
pub fn gather_rows_2d<B: Backend>(x: Tensor<B, 2>, idx: Tensor<B, 2, Int>) -> Tensor<B, 3> {
    let [m, k] = idx.dims();
    let d = x.dims()[1];
    x.select(0, idx.reshape([m * k])).reshape([m, k, d])
}

/// Rows of `x` for every entry of an index tensor of any rank.
///
/// The output rank `O` must be `D + 1`.
///
/// Input shapes: x [n, d], idx [i_1, .., i_D]
/// Output shape: [i_1, .., i_D, d]
pub fn gather_rows_nd<B: Backend, const D: usize, const O: usize>(
    x: Tensor<B, 2>,
    idx: Tensor<B, D, Int>,
) -> Result<Tensor<B, O>> {
    let dims = idx.dims();
    let d = x.dims()[1];
    if O != D + 1 {
        return Err(KpError::config(format!(
            "gather output rank {O} must be the index rank {D} plus one"
        )));
    }
    let mut shape = [d; O];
    shape[..D].copy_from_slice(&dims);
    let count = dims.iter().product::<usize>();
    Ok(x.select(0, idx.reshape([count])).reshape(shape))
}

/// Append one row filled with `fill`.
pub fn pad_row<B: Backend>(x: Tensor<B, 2>, fill: f32) -> Tensor<B, 2> {
    let d = x.dims()[1];
    let row = Tensor::full([1, d], fill, &x.device());
    Tensor::cat(vec![x, row], 0)
}

/// Append the far shadow point to a support set.
pub fn pad_points<B: Backend>(points: Tensor<B, 2>) -> Tensor<B, 2> {
    pad_row(points, SHADOW_COORDINATE)
}

/// Append the zero shadow feature.
pub fn pad_features<B: Backend>(features: Tensor<B, 2>) -> Tensor<B, 2> {
    pad_row(features, 0.0)
}

/// Sentinel-aware gather: shadow slots read a row filled with `fill`.
///
/// Input shape: x [support_len, d]
/// Output shape: [n_query, k, d]
pub fn gather_padded<B: Backend>(
    x: Tensor<B, 2>,
    table: &NeighborTable<B>,
    fill: f32,
) -> Result<Tensor<B, 3>> {
    table.ensure_support(x.dims()[0])?;
    Ok(gather_rows_2d(pad_row(x, fill), table.indices()))
}

/// Neighbor coordinates relative to their query point.
///
/// Shadow neighbors sit at the far coordinate, so their offsets are huge.
///
/// Output shape: [n_query, k, 3]
pub fn relative_neighbors<B: Backend>(
    query: Tensor<B, 2>,
    support: Tensor<B, 2>,
    table: &NeighborTable<B>,
) -> Result<Tensor<B, 3>> {
    table.ensure_queries(query.dims()[0])?;
    let neighbors = gather_padded(support, table, SHADOW_COORDINATE)?;
    Ok(neighbors - query.unsqueeze_dim(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_gather_rows_2d() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], &device);
        let idx = Tensor::<TestBackend, 2, Int>::from_data([[2, 0], [1, 1]], &device);

        let out = gather_rows_2d(x, idx);

        assert_eq!(out.dims(), [2, 2, 2]);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![5.0, 6.0, 1.0, 2.0, 3.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_gather_rows_nd_keeps_index_shape() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], &device);
        let idx = Tensor::<TestBackend, 3, Int>::from_data([[[2, 0]], [[1, 2]]], &device);

        let out: Tensor<TestBackend, 4> = gather_rows_nd(x, idx).unwrap();

        assert_eq!(out.dims(), [2, 1, 2, 2]);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![5.0, 6.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_gather_rows_nd_rejects_wrong_rank() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let idx = Tensor::<TestBackend, 2, Int>::zeros([2, 2], &device);

        let result = gather_rows_nd::<TestBackend, 2, 2>(x, idx);
        assert!(matches!(result, Err(KpError::InvalidConfig { .. })));
    }

    #[test]
    fn test_gather_padded_fills_shadow() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data([[1.0], [2.0]], &device);
        let table = NeighborTable::from_indices(vec![1, 2], 2, 2, &device).unwrap();

        let out = gather_padded(x, &table, -7.0).unwrap();
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![2.0, -7.0]);
    }

    #[test]
    fn test_gather_padded_rejects_other_support() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::zeros([5, 2], &device);
        let table = NeighborTable::from_indices(vec![0, 1], 2, 2, &device).unwrap();
        assert!(gather_padded(x, &table, 0.0).is_err());
    }

    #[test]
    fn test_relative_neighbors() {
        let device = Default::default();
        let query = Tensor::<TestBackend, 2>::from_data([[1.0, 1.0, 1.0]], &device);
        let support =
            Tensor::<TestBackend, 2>::from_data([[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]], &device);
        let table = NeighborTable::from_indices(vec![0, 2], 2, 2, &device).unwrap();

        let rel = relative_neighbors(query, support, &table).unwrap();
        let values = rel.into_data().to_vec::<f32>().unwrap();

        assert_eq!(&values[..3], &[0.0, 1.0, 2.0]);
        assert!(values[3..].iter().all(|&v| v > 1e5));
    }
}
