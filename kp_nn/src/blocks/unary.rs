//! Normalization and point-wise linear blocks.

use burn::module::{Module, Param};
use burn::nn::{BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, Linear, LinearConfig};
use burn::prelude::*;

/// Negative slope of every leaky ReLU in the blocks.
pub const LEAKY_SLOPE: f64 = 0.1;

pub(crate) fn leaky_relu() -> LeakyRelu {
    LeakyReluConfig::new()
        .with_negative_slope(LEAKY_SLOPE)
        .init()
}

/// Batch normalization over points, or a learned bias when disabled.
#[derive(Module, Debug)]
pub struct BatchNormBlock<B: Backend> {
    batch_norm: Option<BatchNorm<B, 1>>,
    bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> BatchNormBlock<B> {
    /// Create a normalization block for `channels` features.
    pub fn new(channels: usize, use_batch_norm: bool, momentum: f64, device: &B::Device) -> Self {
        if use_batch_norm {
            Self {
                batch_norm: Some(BatchNormConfig::new(channels).with_momentum(momentum).init(device)),
                bias: None,
            }
        } else {
            Self {
                batch_norm: None,
                bias: Some(Param::from_tensor(Tensor::zeros([channels], device))),
            }
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [n, c]
    /// Output shape: [n, c]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match (&self.batch_norm, &self.bias) {
            (Some(bn), _) => {
                let [n, c] = x.dims();
                // Points form the length axis of a single-item batch
                let x = x.swap_dims(0, 1).reshape([1, c, n]);
                bn.forward(x).reshape([c, n]).swap_dims(0, 1)
            }
            (None, Some(bias)) => x + bias.val().unsqueeze_dim(0),
            (None, None) => x,
        }
    }
}

/// Linear layer without bias, normalization and optional leaky ReLU.
#[derive(Module, Debug)]
pub struct UnaryBlock<B: Backend> {
    linear: Linear<B>,
    norm: BatchNormBlock<B>,
    activation: Option<LeakyRelu>,
}

impl<B: Backend> UnaryBlock<B> {
    /// Create a unary block.
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        use_batch_norm: bool,
        momentum: f64,
        relu: bool,
        device: &B::Device,
    ) -> Self {
        Self {
            linear: LinearConfig::new(in_dim, out_dim)
                .with_bias(false)
                .init(device),
            norm: BatchNormBlock::new(out_dim, use_batch_norm, momentum, device),
            activation: relu.then(leaky_relu),
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [n, in_dim]
    /// Output shape: [n, out_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.norm.forward(self.linear.forward(x));
        match &self.activation {
            Some(act) => act.forward(x),
            None => x,
        }
    }
}
