//! Tri-plane field sampling compared against the scalar bilinear sampler.

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::TensorData;
use proptest::prelude::*;

use kp_core::sample_grid;
use kp_nn::field::PLANE_AXES;
use kp_nn::prelude::*;

type TestBackend = NdArray;

const RES: usize = 5;
const COMPONENTS: usize = 2;

/// Plane values `[plane][component][row * RES + col]` that differ per node.
fn plane_values() -> Vec<Vec<Vec<f32>>> {
    (0..3)
        .map(|p| {
            (0..COMPONENTS)
                .map(|c| {
                    (0..RES * RES)
                        .map(|i| ((i * 7 + p * 13 + c * 5) % 11) as f32 * 0.25 - 1.0)
                        .collect()
                })
                .collect()
        })
        .collect()
}

fn make_field(values: &[Vec<Vec<f32>>]) -> TriplaneField<TestBackend> {
    let device = Default::default();
    let planes = values
        .iter()
        .map(|plane| {
            let flat: Vec<f32> = plane.iter().flatten().copied().collect();
            Tensor::from_data(TensorData::new(flat, [COMPONENTS, RES, RES]), &device)
        })
        .collect();
    TriplaneField::from_planes(planes, None).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Each plane sample matches the scalar sampler, border clamping included
    #[test]
    fn sample_matches_scalar_sampler(
        x in -1.3f32..1.3,
        y in -1.3f32..1.3,
        z in -1.3f32..1.3,
    ) {
        let values = plane_values();
        let field = make_field(&values);
        let device = Default::default();

        let points = Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![x, y, z], [1, 3]), &device);
        let got = field.sample(points).into_data().to_vec::<f32>().unwrap();
        prop_assert_eq!(got.len(), 3 * COMPONENTS);

        let coords = [x, y, z];
        for (p, (col_axis, row_axis)) in PLANE_AXES.iter().enumerate() {
            let u = (coords[*col_axis] + 1.0) * 0.5;
            let v = (coords[*row_axis] + 1.0) * 0.5;
            for c in 0..COMPONENTS {
                let expected = sample_grid(&values[p][c], RES, u, v);
                let actual = got[p * COMPONENTS + c];
                prop_assert!((actual - expected).abs() < 1e-4,
                    "plane {} component {} at {:?}: field={}, ref={}", p, c, coords, actual, expected);
            }
        }
    }

    /// Without a mapping the output is the sum of the three plane samples
    #[test]
    fn forward_sums_planes(
        x in -1.0f32..1.0,
        y in -1.0f32..1.0,
        z in -1.0f32..1.0,
    ) {
        let field = make_field(&plane_values());
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![x, y, z], [1, 3]), &device);

        let samples = field.sample(points.clone()).into_data().to_vec::<f32>().unwrap();
        let summed = field.forward(points).into_data().to_vec::<f32>().unwrap();

        for c in 0..COMPONENTS {
            let expected = samples[c] + samples[COMPONENTS + c] + samples[2 * COMPONENTS + c];
            prop_assert!((summed[c] - expected).abs() < 1e-5);
        }
    }
}
