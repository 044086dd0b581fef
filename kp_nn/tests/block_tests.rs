//! Blocks built by the factory and run on a small three-level batch.

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::TensorData;

use kp_nn::prelude::*;

type TestBackend = NdArray;

fn device() -> <TestBackend as Backend>::Device {
    Default::default()
}

fn points(rows: &[[f32; 3]]) -> Tensor<TestBackend, 2> {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), 3]), &device())
}

fn table(indices: Vec<i64>, width: usize, support_len: usize) -> NeighborTable<TestBackend> {
    NeighborTable::from_indices(indices, width, support_len, &device()).unwrap()
}

/// Levels of 6, 2 and 1 points.
fn batch() -> GeometryBatch<TestBackend> {
    GeometryBatch {
        points: vec![
            points(&[
                [0.0, 0.0, 0.0],
                [0.2, 0.0, 0.0],
                [0.0, 0.2, 0.0],
                [0.2, 0.2, 0.0],
                [0.1, 0.1, 0.2],
                [0.3, 0.1, 0.1],
            ]),
            points(&[[0.1, 0.05, 0.0], [0.15, 0.15, 0.1]]),
            points(&[[0.12, 0.1, 0.05]]),
        ],
        neighbors: vec![
            table(vec![0, 1, 2, 1, 0, 3, 2, 0, 3, 3, 1, 2, 4, 3, 6, 5, 1, 6], 3, 6),
            table(vec![0, 1, 1, 0], 2, 2),
            table(vec![0], 1, 1),
        ],
        pools: vec![table(vec![0, 1, 2, 3, 4, 5], 3, 6), table(vec![0, 1], 2, 2)],
        upsamples: vec![table(vec![0, 0, 0, 1, 1, 1], 1, 2), table(vec![0, 0], 1, 1)],
        neighbor_radius: vec![0.5, 1.0, 2.0],
        lengths: vec![vec![6], vec![2], vec![1]],
    }
}

fn arch() -> ArchitectureConfig {
    ArchitectureConfig::new()
        .with_num_kernel_points(7)
        .with_triplane(TriplaneSettings::new().with_base_grid_size(16))
}

fn build(name: &str, in_dim: usize, out_dim: usize, layer: usize, arch: &ArchitectureConfig) -> Block<TestBackend> {
    BlockConfig::new(name.to_string(), 0.5, in_dim, out_dim)
        .with_layer(layer)
        .init(arch, &device())
        .unwrap()
}

fn assert_finite(t: &Tensor<TestBackend, 2>) {
    let values = t.clone().into_data().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_conv_block_shapes_for_every_method() {
    let batch = batch();
    let x = Tensor::<TestBackend, 2>::ones([6, 4], &device());

    for method in [
        ConvMethod::Kpconv,
        ConvMethod::TriplaneDirect,
        ConvMethod::TriplaneScored,
        ConvMethod::TriplaneDepthwise,
    ] {
        let arch = arch().with_method(method);

        let out = build("simple", 4, 8, 0, &arch).forward(x.clone(), &batch).unwrap();
        assert_eq!(out.dims(), [6, 4], "{method}");
        assert_finite(&out);

        let out = build("simple_strided", 4, 8, 0, &arch).forward(x.clone(), &batch).unwrap();
        assert_eq!(out.dims(), [2, 4], "{method}");

        let out = build("resnetb", 4, 16, 0, &arch).forward(x.clone(), &batch).unwrap();
        assert_eq!(out.dims(), [6, 16], "{method}");
        assert_finite(&out);

        let out = build("resnetb_strided", 4, 16, 0, &arch).forward(x.clone(), &batch).unwrap();
        assert_eq!(out.dims(), [2, 16], "{method}");
    }
}

#[test]
fn test_resnet_identity_paths() {
    let batch = batch();
    let arch = arch();

    // in == out / 4 skips the first unary; in == out skips the shortcut projection
    let out = build("resnetb", 2, 8, 0, &arch)
        .forward(Tensor::ones([6, 2], &device()), &batch)
        .unwrap();
    assert_eq!(out.dims(), [6, 8]);

    let out = build("resnetb_invariant", 8, 8, 0, &arch)
        .forward(Tensor::ones([6, 8], &device()), &batch)
        .unwrap();
    assert_eq!(out.dims(), [6, 8]);
}

#[test]
fn test_deformable_block_trace_feeds_loss() {
    let batch = batch();
    let arch = arch().with_modulated(true);
    let block = build("resnetb_deformable", 4, 8, 0, &arch);

    let (out, trace) = block
        .forward_traced(Tensor::ones([6, 4], &device()), &batch)
        .unwrap();
    assert_eq!(out.dims(), [6, 8]);

    let trace = trace.expect("deformable block returns a trace");
    assert_eq!(trace.deformed_points.dims(), [6, 7, 3]);

    let loss = DeformationLossConfig::new().init().unwrap();
    let value = loss.forward(&[trace], &device()).into_scalar();
    assert!(value.is_finite() && value >= 0.0);

    let (_, none) = build("resnetb", 4, 8, 0, &arch)
        .forward_traced(Tensor::ones([6, 4], &device()), &batch)
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_generative_kernel_points_in_blocks() {
    let batch = batch();
    let arch = arch().with_generative_kernel_points(true);

    let out = build("simple_deformable", 4, 8, 0, &arch)
        .forward(Tensor::ones([6, 4], &device()), &batch)
        .unwrap();
    assert_eq!(out.dims(), [6, 4]);
    assert_finite(&out);
}

#[test]
fn test_pooling_blocks() {
    let batch = batch();
    let arch = arch();

    // Max pool at layer 0 reads pools[1]: level 1 -> level 2
    let level1 = Tensor::<TestBackend, 2>::from_data([[1.0, -3.0], [2.0, -4.0]], &device());
    let out = build("max_pool", 2, 2, 0, &arch).forward(level1.clone(), &batch).unwrap();
    assert_eq!(out.into_data().to_vec::<f32>().unwrap(), vec![2.0, -3.0]);

    // Upsample at layer 1 reads upsamples[0]: level 1 -> level 0
    let out = build("nearest_upsample", 2, 2, 1, &arch).forward(level1, &batch).unwrap();
    assert_eq!(
        out.into_data().to_vec::<f32>().unwrap(),
        vec![1.0, -3.0, 1.0, -3.0, 1.0, -3.0, 2.0, -4.0, 2.0, -4.0, 2.0, -4.0]
    );

    // Global average over the coarsest level
    let level2 = Tensor::<TestBackend, 2>::from_data([[5.0, 6.0]], &device());
    let out = build("global_average", 2, 2, 2, &arch).forward(level2, &batch).unwrap();
    assert_eq!(out.into_data().to_vec::<f32>().unwrap(), vec![5.0, 6.0]);
}

#[test]
fn test_unary_block() {
    let batch = batch();
    let out = build("unary", 4, 8, 0, &arch())
        .forward(Tensor::ones([6, 4], &device()), &batch)
        .unwrap();
    assert_eq!(out.dims(), [6, 8]);
}

#[test]
fn test_factory_errors() {
    let arch = arch();
    let device = device();

    let unknown = BlockConfig::new("resnet_wide".to_string(), 0.5, 4, 8).init::<TestBackend>(&arch, &device);
    assert!(matches!(unknown, Err(KpError::UnknownBlock { name }) if name == "resnet_wide"));

    let upsample = BlockConfig::new("nearest_upsample".to_string(), 0.5, 4, 4).init::<TestBackend>(&arch, &device);
    assert!(matches!(upsample, Err(KpError::InvalidConfig { .. })));

    let narrow = BlockConfig::new("resnetb".to_string(), 0.5, 4, 2).init::<TestBackend>(&arch, &device);
    assert!(matches!(narrow, Err(KpError::InvalidConfig { .. })));
}

#[test]
fn test_missing_level_is_reported() {
    let mut batch = batch();
    batch.pools.truncate(1);
    let arch = arch();

    let result = build("max_pool", 2, 2, 0, &arch).forward(Tensor::ones([2, 2], &device()), &batch);
    assert!(matches!(
        result,
        Err(KpError::MissingLevel { level: 1, what: "pools" })
    ));
}
