//! Property tests for the scalar convolution building blocks.

use kp_core::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Linear influence never increases with distance
    #[test]
    fn linear_influence_is_non_increasing(
        d0 in 0.0f32..4.0,
        delta in 0.0f32..4.0,
        extent in 0.05f32..3.0,
    ) {
        let near = InfluenceFn::Linear.weight(d0 * d0, extent);
        let far = InfluenceFn::Linear.weight((d0 + delta) * (d0 + delta), extent);
        prop_assert!(far <= near + 1e-6, "near={} far={}", near, far);
        prop_assert!((0.0..=1.0).contains(&near));
    }

    /// Linear influence vanishes at and beyond the extent
    #[test]
    fn linear_influence_zero_beyond_extent(
        extent in 0.05f32..3.0,
        beyond in 0.0f32..2.0,
    ) {
        let d = extent + beyond;
        let w = InfluenceFn::Linear.weight(d * d, extent);
        prop_assert!(w <= 1e-6, "weight {} at distance {} for extent {}", w, d, extent);
    }

    /// Gaussian influence stays positive and strictly decreases
    #[test]
    fn gaussian_influence_positive_and_decreasing(
        d0 in 0.0f32..1.0,
        delta in 0.01f32..0.5,
        extent in 0.5f32..3.0,
    ) {
        let near = InfluenceFn::Gaussian.weight(d0 * d0, extent);
        let far = InfluenceFn::Gaussian.weight((d0 + delta) * (d0 + delta), extent);
        prop_assert!(far > 0.0);
        prop_assert!(far < near, "near={} far={}", near, far);
    }

    /// Bilinear weights form a partition of unity everywhere, including outside the grid
    #[test]
    fn bilinear_weights_partition_unity(
        u in -1.0f32..2.0,
        v in -1.0f32..2.0,
        res in 2usize..64,
    ) {
        let taps = aligned_taps(u, v, res);
        let sum: f32 = taps.weights.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-4);
        for &(r, c) in &taps.nodes {
            prop_assert!(r < res && c < res);
        }
        for &w in &taps.weights {
            prop_assert!(w >= -1e-6);
        }
    }

    /// Sampling at a grid node returns that node's value
    #[test]
    fn bilinear_hits_nodes(
        res in 2usize..32,
        row_frac in 0.0f64..1.0,
        col_frac in 0.0f64..1.0,
    ) {
        let row = ((res - 1) as f64 * row_frac).round() as usize;
        let col = ((res - 1) as f64 * col_frac).round() as usize;
        let values: Vec<f32> = (0..res * res).map(|i| (i as f32).sin()).collect();

        let u = col as f32 / (res - 1) as f32;
        let v = row as f32 / (res - 1) as f32;
        let sampled = sample_grid(&values, res, u, v);

        prop_assert!((sampled - values[row * res + col]).abs() < 1e-4);
    }

    /// Re-packing keeps exactly the in-range neighbors of every row
    #[test]
    fn repack_counts_match_mask(
        rows in 1usize..8,
        width in 1usize..10,
        seed in any::<u64>(),
    ) {
        let support_len = 50;
        let mut state = seed | 1;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let indices: Vec<i64> = (0..rows * width).map(|_| (next() % support_len as u64) as i64).collect();
        let mask: Vec<bool> = (0..rows * width).map(|_| next() % 3 == 0).collect();

        let repacked = repack_in_range(&indices, &mask, rows, width, support_len);
        validate_indices(&repacked.indices, support_len).unwrap();

        for r in 0..rows {
            let expected = mask[r * width..(r + 1) * width].iter().filter(|&&b| b).count();
            let row = &repacked.indices[r * repacked.width..(r + 1) * repacked.width];
            let real = row.iter().filter(|&&i| i as usize != support_len).count();
            prop_assert_eq!(real, expected);
            prop_assert_eq!(row.len() - real, repacked.width - expected);
        }
    }
}

#[test]
fn test_every_policy_produces_requested_count() {
    let provider = SphericalLayout::default();
    for fixed in [FixedPoints::None, FixedPoints::Center, FixedPoints::Verticals] {
        for count in [3usize, 10, 15, 27] {
            let layout = provider.layout(1.5, count, 3, fixed).unwrap();
            assert_eq!(layout.len(), count);
            assert!(layout.iter().all(|p| p.length() <= 1.5));
        }
    }
}

#[test]
fn test_shadow_row_round_trip() {
    let rows = NeighborRows::from_rows(3, 2, &[vec![None, None], vec![Some(2)]]).unwrap();
    let indices = rows.to_indices();
    assert_eq!(indices, vec![3, 3, 2, 3]);

    let back = NeighborRows::from_indices(&indices, 2, 3).unwrap();
    assert_eq!(back.real_count(0), 0);
    assert_eq!(back.real_count(1), 1);
}
