//! Low-rank tri-plane tensor field.
//!
//! Three learnable factor planes, one per coordinate pair, are sampled
//! bilinearly at every query point. The concatenated samples are mapped to
//! the requested output width by a small MLP.

use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::prelude::*;

use kp_core::CLAMP_EPSILON;

use crate::config::TriplaneFieldConfig;
use crate::error::{KpError, Result};
use crate::nn::{Mlp, MlpConfig};

/// Coordinate pairs of the three planes: XY, XZ, YZ.
///
/// The first axis of each pair drives the column, the second the row.
pub const PLANE_AXES: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

impl TriplaneFieldConfig {
    /// Initialize the field.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<TriplaneField<B>> {
        self.validate()?;

        let res = self.grid_size;
        let init = Initializer::Normal {
            mean: 0.0,
            std: self.init_scale,
        };
        let planes = PLANE_AXES
            .iter()
            .map(|_| init.init([self.components, res, res], device))
            .collect();

        let mapping = (!self.no_mapping).then(|| {
            MlpConfig::new(3 * self.components, self.out_width)
                .with_hidden_dims(self.hidden_dims.clone())
                .init(device)
        });

        log::debug!(
            "tri-plane field: {} components on {}x{} planes, output width {}",
            self.components,
            res,
            res,
            self.output_width()
        );

        Ok(TriplaneField {
            planes,
            mapping,
            grid_size: res,
            components: self.components,
        })
    }
}

/// Continuous field mapping local coordinates to weight vectors.
#[derive(Module, Debug)]
pub struct TriplaneField<B: Backend> {
    /// Factor planes `[components, R, R]` in `PLANE_AXES` order.
    planes: Vec<Param<Tensor<B, 3>>>,
    /// Factor-to-weight mapping; `None` sums the plane samples instead.
    mapping: Option<Mlp<B>>,
    #[module(skip)]
    grid_size: usize,
    #[module(skip)]
    components: usize,
}

impl<B: Backend> TriplaneField<B> {
    /// Build a field from explicit planes.
    ///
    /// All three planes must share the shape `[components, R, R]` with `R >= 2`.
    pub fn from_planes(planes: Vec<Tensor<B, 3>>, mapping: Option<Mlp<B>>) -> Result<Self> {
        let Some(first) = planes.first() else {
            return Err(KpError::config("a tri-plane field needs three planes"));
        };
        let [components, res, _] = first.dims();

        if planes.len() != PLANE_AXES.len() {
            return Err(KpError::config(format!(
                "a tri-plane field needs three planes, got {}",
                planes.len()
            )));
        }
        for plane in &planes {
            if plane.dims() != [components, res, res] {
                return Err(KpError::ShapeMismatch {
                    expected: vec![components, res, res],
                    got: plane.dims().to_vec(),
                });
            }
        }
        if res < 2 {
            return Err(KpError::config(format!(
                "tri-plane grid size must be at least 2 for bilinear sampling, got {res}"
            )));
        }
        if let Some(mlp) = &mapping {
            let input = mlp.input_dim();
            if input != 3 * components {
                return Err(KpError::ShapeMismatch {
                    expected: vec![3 * components],
                    got: vec![input],
                });
            }
        }

        Ok(Self {
            planes: planes.into_iter().map(Param::from_tensor).collect(),
            mapping,
            grid_size: res,
            components,
        })
    }

    /// Plane resolution.
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Number of components per plane.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Width of the field output.
    pub fn output_width(&self) -> usize {
        self.mapping
            .as_ref()
            .map_or(self.components, |mlp| mlp.output_dim())
    }

    /// Concatenated raw plane samples.
    ///
    /// Input shape: [P, 3] in `[-1, 1]`
    /// Output shape: [P, 3 * components]
    pub fn sample(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let samples = self
            .planes
            .iter()
            .zip(PLANE_AXES)
            .map(|(plane, (col_axis, row_axis))| {
                self.sample_plane(plane.val(), points.clone(), col_axis, row_axis)
            })
            .collect();
        Tensor::cat(samples, 1)
    }

    /// Evaluate the field.
    ///
    /// Input shape: [P, 3] in `[-1, 1]`; values outside are clamped to the border
    /// Output shape: [P, output_width]
    pub fn forward(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let samples = self.sample(points);
        match &self.mapping {
            Some(mlp) => mlp.forward(samples),
            None => {
                let c = self.components;
                samples.clone().narrow(1, 0, c)
                    + samples.clone().narrow(1, c, c)
                    + samples.narrow(1, 2 * c, c)
            }
        }
    }

    /// Evaluate the field on a batch of point lists.
    ///
    /// Input shape: [a, b, 3]
    /// Output shape: [a, b, output_width]
    pub fn forward_3d(&self, points: Tensor<B, 3>) -> Tensor<B, 3> {
        let [a, b, _] = points.dims();
        let width = self.output_width();
        self.forward(points.reshape([a * b, 3])).reshape([a, b, width])
    }

    fn sample_plane(
        &self,
        plane: Tensor<B, 3>,
        points: Tensor<B, 2>,
        col_axis: usize,
        row_axis: usize,
    ) -> Tensor<B, 2> {
        let res = self.grid_size;
        let [p, _] = points.dims();
        let last = (res - 1) as f32;

        let pixel = |axis: usize| {
            let coord = points.clone().narrow(1, axis, 1).reshape([p]);
            coord.add_scalar(1.0).mul_scalar(0.5 * last)
        };
        let (c0, fx) = axis_taps(pixel(col_axis), last);
        let (r0, fy) = axis_taps(pixel(row_axis), last);

        // [R * R, components], node (row, col) at row * R + col
        let values = plane
            .reshape([self.components, res * res])
            .swap_dims(0, 1);

        let base = r0.mul_scalar(res as i64) + c0;
        let tap = |offset: i64| values.clone().select(0, base.clone().add_scalar(offset));

        let fx = fx.reshape([p, 1]);
        let fy = fy.reshape([p, 1]);
        let gx = fx.clone().neg().add_scalar(1.0);
        let gy = fy.clone().neg().add_scalar(1.0);

        tap(0) * (gx.clone() * gy.clone())
            + tap(1) * (fx.clone() * gy)
            + tap(res as i64) * (gx * fy.clone())
            + tap(res as i64 + 1) * (fx * fy)
    }
}

/// Lower node index and fractional offset along one axis.
///
/// The offset comes from the border-clamped position so it stays
/// differentiable with respect to the coordinates.
fn axis_taps<B: Backend>(pos: Tensor<B, 1>, last: f32) -> (Tensor<B, 1, Int>, Tensor<B, 1>) {
    let clamped = pos.clone().clamp(0.0, last);
    let lower = pos
        .clamp(0.0, last - CLAMP_EPSILON)
        .floor()
        .clamp_max(last - 1.0)
        .detach();
    let frac = clamped - lower.clone();
    (lower.int(), frac)
}
