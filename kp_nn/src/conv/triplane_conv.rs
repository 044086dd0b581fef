//! Tri-plane convolution.
//!
//! Neighbor offsets, normalized by the neighborhood radius, are fed to a
//! tri-plane field that produces the convolution weights for every
//! (point, neighbor) pair.

use burn::module::{Ignored, Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;

use crate::config::{TriplaneConvConfig, TriplaneStrategy};
use crate::error::{KpError, Result};
use crate::field::TriplaneField;
use crate::ops::{gather_rows, gather_rows_2d, pad_features, relative_neighbors, NeighborTable};

impl TriplaneConvConfig {
    /// Initialize the convolution.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<TriplaneConv<B>> {
        self.validate()?;
        let (cin, cout) = (self.in_channels, self.out_channels);

        let field = self.field.field(self.layer, self.field_width()).init(device)?;

        let bank = match self.strategy {
            TriplaneStrategy::Scored { bank_size } => {
                let kernels: Tensor<B, 3> = Initializer::KaimingNormal {
                    gain: 2.0f64.sqrt(),
                    fan_out_only: false,
                }
                .init_with([bank_size, cin, cout], Some(cin * cout), None, device)
                .val();
                // [m, cin, cout] -> [cin, m * cout]
                Some(Param::from_tensor(
                    kernels.swap_dims(0, 1).reshape([cin, bank_size * cout]),
                ))
            }
            _ => None,
        };

        let linear = matches!(self.strategy, TriplaneStrategy::DepthWise)
            .then(|| LinearConfig::new(cin, cout).init(device));

        log::debug!(
            "tri-plane conv layer {}: {:?}, {} -> {} channels, grid {}",
            self.layer,
            self.strategy,
            cin,
            cout,
            field.grid_size()
        );

        Ok(TriplaneConv {
            field,
            bank,
            linear,
            strategy: Ignored(self.strategy),
            in_channels: cin,
            out_channels: cout,
        })
    }
}

/// Tri-plane convolution module.
#[derive(Module, Debug)]
pub struct TriplaneConv<B: Backend> {
    field: TriplaneField<B>,
    /// Shared weight bank `[cin, m * cout]` of the scored strategy.
    bank: Option<Param<Tensor<B, 2>>>,
    /// Channel mix of the depth-wise strategy.
    linear: Option<Linear<B>>,
    strategy: Ignored<TriplaneStrategy>,
    #[module(skip)]
    in_channels: usize,
    #[module(skip)]
    out_channels: usize,
}

impl<B: Backend> TriplaneConv<B> {
    /// Forward pass.
    ///
    /// # Arguments
    /// * `query` - Output point coordinates `[n, 3]`
    /// * `support` - Input point coordinates `[n_s, 3]`
    /// * `neighbors` - Neighbor table `[n, k]`, nearest neighbor first
    /// * `features` - Input features `[n_s, cin]`
    /// * `radius` - Neighborhood radius used to normalize offsets
    pub fn forward(
        &self,
        query: Tensor<B, 2>,
        support: Tensor<B, 2>,
        neighbors: &NeighborTable<B>,
        features: Tensor<B, 2>,
        radius: f32,
    ) -> Result<Tensor<B, 2>> {
        let [n_s, cin] = features.dims();
        if cin != self.in_channels {
            return Err(KpError::ShapeMismatch {
                expected: vec![n_s, self.in_channels],
                got: vec![n_s, cin],
            });
        }
        neighbors.ensure_support(n_s)?;
        if !(radius > 0.0) {
            return Err(KpError::config(format!(
                "neighborhood radius must be positive, got {radius}"
            )));
        }

        let rel = relative_neighbors(query, support, neighbors)?.div_scalar(radius);
        let padded = pad_features(features);
        let [n, k, _] = rel.dims();
        let cout = self.out_channels;
        let weights = self.field.forward_3d(rel);

        let out = match self.strategy.0 {
            TriplaneStrategy::Direct => {
                let kernels = weights.reshape([n * k, cin, cout]);
                gather_rows_2d(padded, neighbors.indices())
                    .reshape([n * k, 1, cin])
                    .matmul(kernels)
                    .reshape([n, k, cout])
                    .sum_dim(1)
                    .reshape([n, cout])
            }
            TriplaneStrategy::Scored { bank_size } => {
                let Some(bank) = &self.bank else {
                    return Err(KpError::config("scored tri-plane convolution has no weight bank"));
                };
                // Every support feature is transformed once by the whole bank
                let transformed = padded.matmul(bank.val());
                let nearest = gather_rows(transformed, neighbors.nearest())
                    .reshape([n, bank_size, cout]);
                weights
                    .sum_dim(1)
                    .matmul(nearest)
                    .reshape([n, cout])
            }
            TriplaneStrategy::DepthWise => {
                let Some(linear) = &self.linear else {
                    return Err(KpError::config("depth-wise tri-plane convolution has no linear layer"));
                };
                let filter = weights.sum_dim(1).reshape([n, cin]);
                let nearest = gather_rows(padded, neighbors.nearest());
                linear.forward(filter * nearest)
            }
        };

        Ok(out)
    }

    /// Convolution strategy.
    pub fn strategy(&self) -> TriplaneStrategy {
        self.strategy.0
    }

    /// Output feature dimension.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}
