//! Convolution blocks: simple and residual bottleneck.

use burn::module::Module;
use burn::nn::LeakyRelu;
use burn::prelude::*;

use super::unary::{leaky_relu, BatchNormBlock, UnaryBlock};
use crate::batch::GeometryBatch;
use crate::config::ArchitectureConfig;
use crate::conv::{ConvOperator, DeformationTrace};
use crate::error::Result;
use crate::ops::max_pool;

/// Build the convolution operator selected by the architecture.
pub(crate) fn conv_operator<B: Backend>(
    arch: &ArchitectureConfig,
    in_dim: usize,
    out_dim: usize,
    radius: f32,
    layer: usize,
    deformable: bool,
    device: &B::Device,
) -> Result<ConvOperator<B>> {
    match arch.triplane_conv(in_dim, out_dim, layer) {
        Some(config) => Ok(ConvOperator::Triplane(config.init(device)?)),
        None => Ok(ConvOperator::KpConv(
            arch.kpconv(in_dim, out_dim, radius, layer, deformable)?
                .init(device)?,
        )),
    }
}

/// Convolution to `out_dim / 2` channels, normalization, leaky ReLU.
#[derive(Module, Debug)]
pub struct SimpleBlock<B: Backend> {
    conv: ConvOperator<B>,
    norm: BatchNormBlock<B>,
    activation: LeakyRelu,
    #[module(skip)]
    layer: usize,
    #[module(skip)]
    strided: bool,
}

impl<B: Backend> SimpleBlock<B> {
    /// Create a simple block.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arch: &ArchitectureConfig,
        in_dim: usize,
        out_dim: usize,
        radius: f32,
        layer: usize,
        deformable: bool,
        strided: bool,
        device: &B::Device,
    ) -> Result<Self> {
        let width = out_dim / 2;
        Ok(Self {
            conv: conv_operator(arch, in_dim, width, radius, layer, deformable, device)?,
            norm: BatchNormBlock::new(width, arch.use_batch_norm, arch.batch_norm_momentum, device),
            activation: leaky_relu(),
            layer,
            strided,
        })
    }

    /// Forward pass returning the deformation trace of the convolution.
    pub fn forward_traced(
        &self,
        x: Tensor<B, 2>,
        batch: &GeometryBatch<B>,
    ) -> Result<(Tensor<B, 2>, Option<DeformationTrace<B>>)> {
        let geometry = batch.layer(self.layer, self.strided)?;
        let out = self.conv.forward(&geometry, x)?;
        let features = self.activation.forward(self.norm.forward(out.features));
        Ok((features, out.deformation))
    }
}

/// Residual bottleneck: reduce to `out_dim / 4`, convolve, expand, add the shortcut.
#[derive(Module, Debug)]
pub struct ResnetBottleneckBlock<B: Backend> {
    /// Absent when the input already has `out_dim / 4` channels.
    unary1: Option<UnaryBlock<B>>,
    conv: ConvOperator<B>,
    norm: BatchNormBlock<B>,
    unary2: UnaryBlock<B>,
    /// Absent when input and output widths match.
    shortcut: Option<UnaryBlock<B>>,
    activation: LeakyRelu,
    #[module(skip)]
    layer: usize,
    #[module(skip)]
    strided: bool,
}

impl<B: Backend> ResnetBottleneckBlock<B> {
    /// Create a bottleneck block.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arch: &ArchitectureConfig,
        in_dim: usize,
        out_dim: usize,
        radius: f32,
        layer: usize,
        deformable: bool,
        strided: bool,
        device: &B::Device,
    ) -> Result<Self> {
        let (bn, momentum) = (arch.use_batch_norm, arch.batch_norm_momentum);
        let width = out_dim / 4;

        Ok(Self {
            unary1: (in_dim != width)
                .then(|| UnaryBlock::new(in_dim, width, bn, momentum, true, device)),
            conv: conv_operator(arch, width, width, radius, layer, deformable, device)?,
            norm: BatchNormBlock::new(width, bn, momentum, device),
            unary2: UnaryBlock::new(width, out_dim, bn, momentum, false, device),
            shortcut: (in_dim != out_dim)
                .then(|| UnaryBlock::new(in_dim, out_dim, bn, momentum, false, device)),
            activation: leaky_relu(),
            layer,
            strided,
        })
    }

    /// Forward pass returning the deformation trace of the convolution.
    pub fn forward_traced(
        &self,
        features: Tensor<B, 2>,
        batch: &GeometryBatch<B>,
    ) -> Result<(Tensor<B, 2>, Option<DeformationTrace<B>>)> {
        let geometry = batch.layer(self.layer, self.strided)?;

        let x = match &self.unary1 {
            Some(unary) => unary.forward(features.clone()),
            None => features.clone(),
        };
        let out = self.conv.forward(&geometry, x)?;
        let x = self.activation.forward(self.norm.forward(out.features));
        let x = self.unary2.forward(x);

        let shortcut = if self.strided {
            max_pool(features, geometry.neighbors)?
        } else {
            features
        };
        let shortcut = match &self.shortcut {
            Some(unary) => unary.forward(shortcut),
            None => shortcut,
        };

        Ok((self.activation.forward(x + shortcut), out.deformation))
    }
}
