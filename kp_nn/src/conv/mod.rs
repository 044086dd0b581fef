//! Point convolution operators.

mod kpconv;
mod triplane_conv;

pub use kpconv::{DeformationTrace, KpConv, KpConvOutput, KpKernel, OffsetHead, WeightBank};
pub use triplane_conv::TriplaneConv;

use burn::module::Module;
use burn::prelude::*;

use crate::batch::LayerGeometry;
use crate::error::Result;

/// Convolution used inside a block.
#[derive(Module, Debug)]
pub enum ConvOperator<B: Backend> {
    /// Kernel-point convolution.
    KpConv(KpConv<B>),
    /// Tri-plane convolution.
    Triplane(TriplaneConv<B>),
}

impl<B: Backend> ConvOperator<B> {
    /// Run the convolution on one layer of geometry.
    pub fn forward(
        &self,
        geometry: &LayerGeometry<'_, B>,
        features: Tensor<B, 2>,
    ) -> Result<KpConvOutput<B>> {
        match self {
            ConvOperator::KpConv(conv) => conv.forward(
                geometry.query.clone(),
                geometry.support.clone(),
                geometry.neighbors,
                features,
            ),
            ConvOperator::Triplane(conv) => Ok(KpConvOutput {
                features: conv.forward(
                    geometry.query.clone(),
                    geometry.support.clone(),
                    geometry.neighbors,
                    features,
                    geometry.radius,
                )?,
                deformation: None,
            }),
        }
    }

    /// Output feature dimension.
    pub fn out_channels(&self) -> usize {
        match self {
            ConvOperator::KpConv(conv) => conv.out_channels(),
            ConvOperator::Triplane(conv) => conv.out_channels(),
        }
    }
}
