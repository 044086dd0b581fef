//! Example: a small KPConv encoder on a synthetic point cloud.
//!
//! This example walks through the pieces a training pipeline needs:
//! 1. Subsample a cloud into two levels and build neighbor tables
//! 2. Build an encoder from block names with the block factory
//! 3. Run the forward pass and collect deformation traces
//! 4. Backpropagate the deformation loss
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p kp_nn --example backbone --features examples
//! ```

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use burn::tensor::TensorData;

use kp_nn::prelude::*;

type MyBackend = Autodiff<NdArray>;

/// Grid step of the first subsampling.
const FIRST_STEP: f32 = 0.1;

/// Points on a unit sphere, Fibonacci spiral.
fn sphere(n: usize) -> Vec<Point3> {
    let golden = core::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let r = (1.0 - z * z).sqrt();
            let theta = golden * i as f32;
            Point3::new(r * theta.cos(), r * theta.sin(), z)
        })
        .collect()
}

/// Brute-force radius search, nearest first, capped at `limit`.
fn radius_neighbors(
    query: &[Point3],
    support: &[Point3],
    radius: f32,
    limit: usize,
) -> Result<NeighborRows> {
    let r2 = radius * radius;
    let rows: Vec<Vec<Option<usize>>> = query
        .iter()
        .map(|q| {
            let mut found: Vec<(f32, usize)> = support
                .iter()
                .enumerate()
                .map(|(i, s)| (q.distance_squared(*s), i))
                .filter(|(d2, _)| *d2 <= r2)
                .collect();
            found.sort_by(|a, b| a.0.total_cmp(&b.0));
            found.truncate(limit);
            found.into_iter().map(|(_, i)| Some(i)).collect()
        })
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    Ok(NeighborRows::from_rows(support.len(), width, &rows)?)
}

fn upload(points: &[Point3], device: &<MyBackend as Backend>::Device) -> Tensor<MyBackend, 2> {
    let flat: Vec<f32> = points.iter().flat_map(|p| p.as_array()).collect();
    Tensor::from_data(TensorData::new(flat, [points.len(), 3]), device)
}

fn make_batch(
    arch: &ArchitectureConfig,
    device: &<MyBackend as Backend>::Device,
) -> Result<GeometryBatch<MyBackend>> {
    let level0 = sphere(400);
    let level1: Vec<Point3> = level0.iter().step_by(4).copied().collect();

    let r0 = FIRST_STEP * arch.conv_radius;
    let r1 = 2.0 * r0;
    let limits = &arch.neighbor_limits;

    let table = |rows: NeighborRows| NeighborTable::from_rows(&rows, device);

    Ok(GeometryBatch {
        points: vec![upload(&level0, device), upload(&level1, device)],
        neighbors: vec![
            table(radius_neighbors(&level0, &level0, r0, limits[0])?),
            table(radius_neighbors(&level1, &level1, r1, limits[1])?),
        ],
        pools: vec![table(radius_neighbors(&level1, &level0, r0, limits[0])?)],
        upsamples: vec![table(radius_neighbors(&level0, &level1, r1, 1)?)],
        neighbor_radius: vec![r0, r1],
        lengths: vec![vec![level0.len()], vec![level1.len()]],
    })
}

fn run(method: ConvMethod) -> Result<()> {
    let device = burn::backend::ndarray::NdArrayDevice::Cpu;
    let arch = ArchitectureConfig::new()
        .with_method(method)
        .with_triplane(TriplaneSettings::new().with_base_grid_size(32));
    let batch = make_batch(&arch, &device)?;

    let r0 = batch.radius(0)?;
    let r1 = batch.radius(1)?;
    let encoder = [
        BlockConfig::new("simple".to_string(), r0, 1, 32),
        BlockConfig::new("resnetb".to_string(), r0, 32, 64),
        BlockConfig::new("resnetb_strided".to_string(), r0, 64, 128),
        BlockConfig::new("resnetb_deformable".to_string(), r1, 128, 128).with_layer(1),
        BlockConfig::new("global_average".to_string(), r1, 128, 128).with_layer(1),
    ]
    .iter()
    .map(|config| config.init::<MyBackend>(&arch, &device))
    .collect::<Result<Vec<_>>>()?;

    let n0 = batch.points(0)?.dims()[0];
    let mut x = Tensor::<MyBackend, 2>::ones([n0, 1], &device);
    let mut traces = Vec::new();
    for block in &encoder {
        let (out, trace) = block.forward_traced(x, &batch)?;
        println!("  {:<24} -> {:?}", block_name(block), out.dims());
        traces.extend(trace);
        x = out;
    }

    let loss = DeformationLossConfig::new().init()?;
    let total = loss.forward(&traces, &device) + x.powf_scalar(2.0).mean().mul_scalar(1e-3);
    let value = total.clone().into_scalar();
    let _grads = total.backward();

    println!("  traces: {}, loss: {value:.6}", traces.len());
    Ok(())
}

fn block_name<B: Backend>(block: &Block<B>) -> &'static str {
    match block {
        Block::Unary(_) => "unary",
        Block::Simple(_) => "simple",
        Block::Resnet(_) => "resnetb",
        Block::MaxPool(_) => "max_pool",
        Block::GlobalAverage(_) => "global_average",
        Block::NearestUpsample(_) => "nearest_upsample",
    }
}

fn main() {
    env_logger::init();

    for method in [
        ConvMethod::Kpconv,
        ConvMethod::TriplaneDirect,
        ConvMethod::TriplaneScored,
        ConvMethod::TriplaneDepthwise,
    ] {
        println!("Encoder with {method}");
        if let Err(e) = run(method) {
            eprintln!("  failed: {e}");
            std::process::exit(1);
        }
        println!();
    }
}
