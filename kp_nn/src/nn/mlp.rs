//! Feed-forward mapping from tri-plane factors to kernel weights.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Configuration for an MLP.
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Hidden layer dimensions. Empty means a single linear layer.
    #[config(default = "vec![]")]
    pub hidden_dims: Vec<usize>,
}

impl MlpConfig {
    /// Initialize the MLP.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let mut layers = Vec::with_capacity(self.hidden_dims.len());
        let mut in_dim = self.input_dim;

        for &out_dim in &self.hidden_dims {
            layers.push(LinearConfig::new(in_dim, out_dim).init(device));
            in_dim = out_dim;
        }

        Mlp {
            layers,
            output: LinearConfig::new(in_dim, self.output_dim).init(device),
            activation: Relu::new(),
        }
    }
}

/// Multi-layer perceptron with ReLU between layers and a linear head.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    layers: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Mlp<B> {
    /// Forward pass.
    ///
    /// Input shape: [batch, input_dim]
    /// Output shape: [batch, output_dim]
    pub fn forward(&self, mut x: Tensor<B, 2>) -> Tensor<B, 2> {
        for layer in &self.layers {
            x = self.activation.forward(layer.forward(x));
        }
        self.output.forward(x)
    }

    /// Input width.
    pub fn input_dim(&self) -> usize {
        self.layers
            .first()
            .unwrap_or(&self.output)
            .weight
            .dims()[0]
    }

    /// Output width.
    pub fn output_dim(&self) -> usize {
        self.output.weight.dims()[1]
    }
}
