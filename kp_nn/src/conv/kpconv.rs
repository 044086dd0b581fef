//! Kernel-point convolution.
//!
//! Every output point looks at its neighbors relative to itself and weighs
//! them against a small set of kernel points by distance. Each kernel point
//! owns a `cin x cout` matrix, either learned directly or sampled from a
//! tri-plane field at the kernel point's position.
//!
//! Kernel points come from a fixed layout or are generated per point from the
//! neighborhood. In deformable mode an auxiliary rigid convolution predicts a
//! displacement (and optionally a modulation) for every kernel point, and the
//! neighbor table is re-packed to the neighbors that some deformed kernel
//! point still reaches.

use burn::module::{Ignored, Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::TensorData;

use kp_core::{
    repack_in_range, Aggregation, InfluenceFn, KernelLayoutProvider, Point3, SphericalLayout,
    GAUSSIAN_EPSILON, GAUSSIAN_SIGMA_RATIO,
};

use crate::config::{Deformation, KernelSource, KernelWeights, KpConvConfig};
use crate::error::{KpError, Result};
use crate::field::TriplaneField;
use crate::ops::{gather_rows_2d, pad_features, relative_neighbors, NeighborTable};

impl KpConvConfig {
    /// Initialize with the default spherical kernel layout.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<KpConv<B>> {
        self.init_with_layout(&SphericalLayout::default(), device)
    }

    /// Initialize with kernel points from a layout provider.
    pub fn init_with_layout<B: Backend>(
        &self,
        provider: &impl KernelLayoutProvider,
        device: &B::Device,
    ) -> Result<KpConv<B>> {
        self.validate()?;
        let points = provider.layout(self.radius, self.kernel_count, 3, self.fixed_points)?;
        self.init_with_kernel_points(points, device)
    }

    /// Initialize with explicit kernel points.
    pub fn init_with_kernel_points<B: Backend>(
        &self,
        points: Vec<Point3>,
        device: &B::Device,
    ) -> Result<KpConv<B>> {
        self.validate()?;
        if points.len() != self.kernel_count {
            return Err(KpError::ShapeMismatch {
                expected: vec![self.kernel_count, 3],
                got: vec![points.len(), 3],
            });
        }

        let kernel = self.init_kernel(&points, self.out_channels, self.weights.clone(), true, device)?;

        let offset = match self.offset_dim() {
            Some(offset_dim) => Some(OffsetHead {
                kernel: self.init_kernel(&points, offset_dim, KernelWeights::Static, false, device)?,
                bias: Param::from_tensor(Tensor::zeros([offset_dim], device)),
            }),
            None => None,
        };

        log::debug!(
            "KPConv layer {}: {} kernel points, {} -> {} channels, extent {:.3}, {:?}, {:?}, {:?}",
            self.layer,
            self.kernel_count,
            self.in_channels,
            self.out_channels,
            self.extent,
            self.deformation,
            self.kernel_source,
            self.influence,
        );

        Ok(KpConv {
            kernel,
            offset,
            modulated: matches!(self.deformation, Deformation::Deformable { modulated: true }),
        })
    }

    fn init_kernel<B: Backend>(
        &self,
        points: &[Point3],
        out_channels: usize,
        weights: KernelWeights,
        generative: bool,
        device: &B::Device,
    ) -> Result<KpKernel<B>> {
        let k = self.kernel_count;
        let flat: Vec<f32> = points.iter().flat_map(|p| p.as_array()).collect();
        let kernel_points = Tensor::from_data(TensorData::new(flat, [k, 3]), device);

        let (generator, max_neighbors) = match self.kernel_source {
            KernelSource::Generative { max_neighbors } if generative => (
                Some(LinearConfig::new(3 * max_neighbors, 3 * k).init(device)),
                max_neighbors,
            ),
            _ => (None, 0),
        };

        let weights = match weights {
            KernelWeights::Static => {
                let fan_in = self.in_channels * out_channels;
                WeightBank::Static(
                    Initializer::KaimingUniform {
                        gain: 1.0 / 3.0f64.sqrt(),
                        fan_out_only: false,
                    }
                    .init_with([k, self.in_channels, out_channels], Some(fan_in), None, device),
                )
            }
            KernelWeights::Triplane(settings) => WeightBank::Triplane(
                settings
                    .field(self.layer, self.in_channels * out_channels)
                    .init(device)?,
            ),
        };

        Ok(KpKernel {
            kernel_points,
            generator,
            weights,
            kernel_count: k,
            in_channels: self.in_channels,
            out_channels,
            extent: self.extent,
            radius: self.radius,
            influence: Ignored(self.influence),
            aggregation: Ignored(self.aggregation),
            max_neighbors,
        })
    }
}

/// Per-kernel-point weight matrices.
#[derive(Module, Debug)]
pub enum WeightBank<B: Backend> {
    /// Learned `[K, cin, cout]` tensor.
    Static(Param<Tensor<B, 3>>),
    /// Field sampled at the kernel-point positions.
    Triplane(TriplaneField<B>),
}

/// Kernel points, their weights and the influence settings.
#[derive(Module, Debug)]
pub struct KpKernel<B: Backend> {
    /// Canonical kernel points `[K, 3]`.
    kernel_points: Tensor<B, 2>,
    /// Maps flattened neighbor offsets to kernel points.
    generator: Option<Linear<B>>,
    weights: WeightBank<B>,
    #[module(skip)]
    kernel_count: usize,
    #[module(skip)]
    in_channels: usize,
    #[module(skip)]
    out_channels: usize,
    #[module(skip)]
    extent: f32,
    #[module(skip)]
    radius: f32,
    influence: Ignored<InfluenceFn>,
    aggregation: Ignored<Aggregation>,
    #[module(skip)]
    max_neighbors: usize,
}

impl<B: Backend> KpKernel<B> {
    /// Undeformed kernel positions for every query point.
    ///
    /// Input shape: rel [n, k, 3]
    /// Output shape: [n, K, 3]
    fn positions(&self, rel: Tensor<B, 3>, table: &NeighborTable<B>) -> Result<Tensor<B, 3>> {
        let [n, k, _] = rel.dims();
        let kk = self.kernel_count;

        let Some(generator) = &self.generator else {
            return Ok(self.kernel_points.clone().unsqueeze_dim::<3>(0).expand([n, kk, 3]));
        };

        if k > self.max_neighbors {
            return Err(KpError::NeighborWidthExceeded {
                width: k,
                max: self.max_neighbors,
            });
        }

        // Shadow slots read the same filler as the padding columns
        let shadow = table
            .indices()
            .equal_elem(table.sentinel() as i64)
            .unsqueeze_dim::<3>(2)
            .expand([n, k, 3]);
        let mut offsets = rel.mask_fill(shadow, -1.0);
        if k < self.max_neighbors {
            let filler = Tensor::full([n, self.max_neighbors - k, 3], -1.0, &offsets.device());
            offsets = Tensor::cat(vec![offsets, filler], 1);
        }

        let generated = generator.forward(offsets.reshape([n, 3 * self.max_neighbors]));
        Ok(generated.reshape([n, kk, 3]))
    }

    /// Kernel influence on every neighbor, kernel-major.
    ///
    /// Input shape: sq [n, k, K]
    /// Output shape: [n, K, k]
    fn influence_weights(&self, sq: Tensor<B, 3>) -> Tensor<B, 3> {
        let [n, k, kk] = sq.dims();

        let mut weights = match self.influence.0 {
            InfluenceFn::Constant => sq.ones_like(),
            InfluenceFn::Linear => sq
                .clone()
                .sqrt()
                .div_scalar(self.extent)
                .neg()
                .add_scalar(1.0)
                .clamp_min(0.0),
            InfluenceFn::Gaussian => {
                let sigma = GAUSSIAN_SIGMA_RATIO * self.extent;
                sq.clone()
                    .div_scalar(2.0 * sigma * sigma + GAUSSIAN_EPSILON)
                    .neg()
                    .exp()
            }
        };

        if self.aggregation.0 == Aggregation::Closest {
            let nearest = sq.argmin(2).expand([n, k, kk]);
            let kernel_ids = Tensor::<B, 1, Int>::arange(0..kk as i64, &weights.device())
                .reshape([1, 1, kk])
                .expand([n, k, kk]);
            weights = weights * kernel_ids.equal(nearest).float();
        }

        weights.swap_dims(1, 2)
    }

    /// Weigh neighbor features and apply the kernel matrices.
    ///
    /// # Arguments
    /// * `sq` - Squared neighbor/kernel distances `[n, k, K]`
    /// * `indices` - Neighbor indices `[n, k]` into `padded`
    /// * `padded` - Support features with the zero shadow row `[n_s + 1, cin]`
    /// * `positions` - Kernel positions `[n, K, 3]`
    /// * `modulations` - Optional per-kernel scale `[n, K]`
    fn convolve(
        &self,
        sq: Tensor<B, 3>,
        indices: Tensor<B, 2, Int>,
        padded: Tensor<B, 2>,
        positions: Tensor<B, 3>,
        modulations: Option<Tensor<B, 2>>,
    ) -> Tensor<B, 2> {
        let [n, kk, _] = positions.dims();
        let (cin, cout) = (self.in_channels, self.out_channels);

        let neighbor_features = gather_rows_2d(padded, indices);
        let mut weighted = self.influence_weights(sq).matmul(neighbor_features);
        if let Some(modulations) = modulations {
            weighted = weighted * modulations.unsqueeze_dim(2);
        }

        match &self.weights {
            WeightBank::Static(w) => weighted
                .swap_dims(0, 1)
                .matmul(w.val())
                .sum_dim(0)
                .reshape([n, cout]),
            WeightBank::Triplane(field) => {
                let kernels = field
                    .forward_3d(positions.div_scalar(self.radius))
                    .reshape([n * kk, cin, cout]);
                weighted
                    .reshape([n * kk, 1, cin])
                    .matmul(kernels)
                    .reshape([n, kk, cout])
                    .sum_dim(1)
                    .reshape([n, cout])
            }
        }
    }
}

/// Squared distance between every neighbor and every kernel point.
///
/// Input shapes: rel [n, k, 3], positions [n, K, 3]
/// Output shape: [n, k, K]
fn squared_distances<B: Backend>(rel: Tensor<B, 3>, positions: Tensor<B, 3>) -> Tensor<B, 3> {
    let [n, k, _] = rel.dims();
    let kk = positions.dims()[1];
    let diff = rel.unsqueeze_dim::<4>(2) - positions.unsqueeze_dim::<4>(1);
    (diff.clone() * diff).sum_dim(3).reshape([n, k, kk])
}

/// Rigid convolution predicting kernel-point offsets and modulations.
#[derive(Module, Debug)]
pub struct OffsetHead<B: Backend> {
    kernel: KpKernel<B>,
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> OffsetHead<B> {
    fn forward(
        &self,
        rel: Tensor<B, 3>,
        table: &NeighborTable<B>,
        padded: Tensor<B, 2>,
    ) -> Result<Tensor<B, 2>> {
        let positions = self.kernel.positions(rel.clone(), table)?;
        let sq = squared_distances(rel, positions.clone());
        let raw = self
            .kernel
            .convolve(sq, table.indices(), padded, positions, None);
        Ok(raw + self.bias.val().unsqueeze_dim(0))
    }
}

/// Deformation state of one forward pass, consumed by the regularization losses.
#[derive(Debug, Clone)]
pub struct DeformationTrace<B: Backend> {
    /// Squared distance from every deformed kernel point to its closest neighbor `[n, K]`.
    pub min_d2: Tensor<B, 2>,
    /// Deformed kernel points relative to their query point `[n, K, 3]`.
    pub deformed_points: Tensor<B, 3>,
    /// Re-packed neighbor table `[n, width]`, sentinel padded.
    pub neighbors: Tensor<B, 2, Int>,
    /// Influence extent of the convolution.
    pub extent: f32,
}

/// Output of a kernel-point convolution.
#[derive(Debug, Clone)]
pub struct KpConvOutput<B: Backend> {
    /// Output features `[n_query, cout]`.
    pub features: Tensor<B, 2>,
    /// Present when the kernel points are deformable.
    pub deformation: Option<DeformationTrace<B>>,
}

/// Kernel-point convolution module.
#[derive(Module, Debug)]
pub struct KpConv<B: Backend> {
    kernel: KpKernel<B>,
    offset: Option<OffsetHead<B>>,
    #[module(skip)]
    modulated: bool,
}

impl<B: Backend> KpConv<B> {
    /// Forward pass.
    ///
    /// # Arguments
    /// * `query` - Output point coordinates `[n, 3]`
    /// * `support` - Input point coordinates `[n_s, 3]`
    /// * `neighbors` - Neighbor table `[n, k]` validated against `n_s`
    /// * `features` - Input features `[n_s, cin]`
    pub fn forward(
        &self,
        query: Tensor<B, 2>,
        support: Tensor<B, 2>,
        neighbors: &NeighborTable<B>,
        features: Tensor<B, 2>,
    ) -> Result<KpConvOutput<B>> {
        let [n_s, cin] = features.dims();
        if cin != self.kernel.in_channels {
            return Err(KpError::ShapeMismatch {
                expected: vec![n_s, self.kernel.in_channels],
                got: vec![n_s, cin],
            });
        }
        neighbors.ensure_support(n_s)?;

        let rel = relative_neighbors(query, support, neighbors)?;
        let padded = pad_features(features);
        let [n, k, _] = rel.dims();
        let kk = self.kernel.kernel_count;

        let positions = self.kernel.positions(rel.clone(), neighbors)?;

        let Some(head) = &self.offset else {
            let sq = squared_distances(rel, positions.clone());
            let features = self
                .kernel
                .convolve(sq, neighbors.indices(), padded, positions, None);
            return Ok(KpConvOutput {
                features,
                deformation: None,
            });
        };

        let raw = head.forward(rel.clone(), neighbors, padded.clone())?;
        let modulations = self
            .modulated
            .then(|| sigmoid(raw.clone().narrow(1, 3 * kk, kk)).mul_scalar(2.0));
        // Generated kernel points are used as-is; the head only modulates them
        let positions = if self.kernel.generator.is_some() {
            positions
        } else {
            let offsets = raw
                .narrow(1, 0, 3 * kk)
                .reshape([n, kk, 3])
                .mul_scalar(self.kernel.extent);
            positions + offsets
        };

        let sq = squared_distances(rel, positions.clone());
        let min_d2 = sq.clone().min_dim(1).reshape([n, kk]);

        let extent_sq = self.kernel.extent * self.kernel.extent;
        let in_range = sq
            .clone()
            .lower_elem(extent_sq)
            .any_dim(2)
            .reshape([n * k])
            .into_data()
            .to_vec::<bool>()
            .map_err(|e| KpError::InvalidData(format!("{e:?}")))?;

        let repacked = repack_in_range(
            neighbors.host_indices(),
            &in_range,
            n,
            k,
            neighbors.sentinel(),
        );
        log::trace!("re-packed neighbor width {} -> {}", k, repacked.width);

        let device = sq.device();
        let width = repacked.width;
        let indices =
            Tensor::<B, 2, Int>::from_data(TensorData::new(repacked.indices, [n, width]), &device);
        let columns =
            Tensor::<B, 2, Int>::from_data(TensorData::new(repacked.columns, [n, width]), &device);
        let sq = sq.gather(1, columns.unsqueeze_dim::<3>(2).expand([n, width, kk]));

        let features = self
            .kernel
            .convolve(sq, indices.clone(), padded, positions.clone(), modulations);

        Ok(KpConvOutput {
            features,
            deformation: Some(DeformationTrace {
                min_d2,
                deformed_points: positions,
                neighbors: indices,
                extent: self.kernel.extent,
            }),
        })
    }

    /// Canonical kernel points `[K, 3]`.
    pub fn kernel_points(&self) -> Tensor<B, 2> {
        self.kernel.kernel_points.clone()
    }

    /// Number of kernel points.
    pub fn kernel_count(&self) -> usize {
        self.kernel.kernel_count
    }

    /// Influence extent.
    pub fn extent(&self) -> f32 {
        self.kernel.extent
    }

    /// Output feature dimension.
    pub fn out_channels(&self) -> usize {
        self.kernel.out_channels
    }

    /// Whether an offset head deforms the kernel points.
    pub fn is_deformable(&self) -> bool {
        self.offset.is_some()
    }

    /// Overwrite the static kernel weights `[K, cin, cout]`.
    pub fn with_weights(mut self, weights: Tensor<B, 3>) -> Result<Self> {
        let expected = [
            self.kernel.kernel_count,
            self.kernel.in_channels,
            self.kernel.out_channels,
        ];
        if weights.dims() != expected {
            return Err(KpError::ShapeMismatch {
                expected: expected.to_vec(),
                got: weights.dims().to_vec(),
            });
        }
        self.kernel.weights = WeightBank::Static(Param::from_tensor(weights));
        Ok(self)
    }

    /// Overwrite the offset head's static weights `[K, cin, offset_dim]`.
    pub fn with_offset_weights(mut self, weights: Tensor<B, 3>) -> Result<Self> {
        let Some(head) = self.offset.as_mut() else {
            return Err(KpError::config("the convolution has no offset head"));
        };
        let expected = [
            head.kernel.kernel_count,
            head.kernel.in_channels,
            head.kernel.out_channels,
        ];
        if weights.dims() != expected {
            return Err(KpError::ShapeMismatch {
                expected: expected.to_vec(),
                got: weights.dims().to_vec(),
            });
        }
        head.kernel.weights = WeightBank::Static(Param::from_tensor(weights));
        Ok(self)
    }

    /// Static kernel weights `[K, cin, cout]`, `None` for field-generated weights.
    pub fn static_weights(&self) -> Option<Tensor<B, 3>> {
        match &self.kernel.weights {
            WeightBank::Static(w) => Some(w.val()),
            WeightBank::Triplane(_) => None,
        }
    }
}
