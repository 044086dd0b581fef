//! Composite blocks and the block factory.
//!
//! A network is described as a list of block names. Each name is parsed into
//! a [`BlockKind`] and built by [`BlockConfig::init`] with the shared
//! [`ArchitectureConfig`].

mod conv_blocks;
mod pooling;
mod unary;

use std::fmt;
use std::str::FromStr;

use burn::config::Config;
use burn::module::Module;
use burn::prelude::*;

pub use conv_blocks::{ResnetBottleneckBlock, SimpleBlock};
pub use pooling::{GlobalAverageBlock, MaxPoolBlock, NearestUpsampleBlock};
pub use unary::{BatchNormBlock, UnaryBlock, LEAKY_SLOPE};

use crate::batch::GeometryBatch;
use crate::config::ArchitectureConfig;
use crate::conv::DeformationTrace;
use crate::error::{self, KpError};

/// Name qualifier of a convolution block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConvVariant {
    /// Rigid kernel points.
    #[default]
    Rigid,
    /// Deformable kernel points.
    Deformable,
    /// Accepted for compatibility; behaves as rigid.
    Invariant,
    /// Accepted for compatibility; behaves as rigid.
    Equivariant,
}

impl ConvVariant {
    const fn suffix(self) -> &'static str {
        match self {
            ConvVariant::Rigid => "",
            ConvVariant::Deformable => "_deformable",
            ConvVariant::Invariant => "_invariant",
            ConvVariant::Equivariant => "_equivariant",
        }
    }
}

/// Convolution block qualifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConvBlockKind {
    /// Name qualifier.
    pub variant: ConvVariant,
    /// Read level `l`, write level `l + 1`.
    pub strided: bool,
}

impl ConvBlockKind {
    /// Whether the convolution deforms its kernel points.
    pub fn deformable(self) -> bool {
        self.variant == ConvVariant::Deformable
    }

    fn parse(rest: &str) -> Option<Self> {
        let (rest, strided) = match rest.strip_suffix("_strided") {
            Some(rest) => (rest, true),
            None => (rest, false),
        };
        let variant = match rest {
            "" => ConvVariant::Rigid,
            "_deformable" => ConvVariant::Deformable,
            "_invariant" => ConvVariant::Invariant,
            "_equivariant" => ConvVariant::Equivariant,
            _ => return None,
        };
        Some(Self { variant, strided })
    }
}

/// Parsed block name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `unary`
    Unary,
    /// `simple[_deformable|_invariant|_equivariant][_strided]`
    Simple(ConvBlockKind),
    /// `resnetb[_deformable|_invariant|_equivariant][_strided]`
    Resnet(ConvBlockKind),
    /// `max_pool` or `max_pool_wide`
    MaxPool {
        /// Parsed from `max_pool_wide`; pools the same way.
        wide: bool,
    },
    /// `global_average`
    GlobalAverage,
    /// `nearest_upsample`
    NearestUpsample,
}

impl FromStr for BlockKind {
    type Err = KpError;

    fn from_str(s: &str) -> error::Result<Self> {
        let kind = match s {
            "unary" => Some(BlockKind::Unary),
            "max_pool" => Some(BlockKind::MaxPool { wide: false }),
            "max_pool_wide" => Some(BlockKind::MaxPool { wide: true }),
            "global_average" => Some(BlockKind::GlobalAverage),
            "nearest_upsample" => Some(BlockKind::NearestUpsample),
            _ => {
                if let Some(rest) = s.strip_prefix("simple") {
                    ConvBlockKind::parse(rest).map(BlockKind::Simple)
                } else if let Some(rest) = s.strip_prefix("resnetb") {
                    ConvBlockKind::parse(rest).map(BlockKind::Resnet)
                } else {
                    None
                }
            }
        };
        kind.ok_or_else(|| {
            log::error!("unknown block name '{s}'");
            KpError::UnknownBlock {
                name: s.to_string(),
            }
        })
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conv = |f: &mut fmt::Formatter<'_>, prefix: &str, kind: &ConvBlockKind| {
            let strided = if kind.strided { "_strided" } else { "" };
            write!(f, "{prefix}{}{strided}", kind.variant.suffix())
        };
        match self {
            BlockKind::Unary => f.write_str("unary"),
            BlockKind::Simple(kind) => conv(f, "simple", kind),
            BlockKind::Resnet(kind) => conv(f, "resnetb", kind),
            BlockKind::MaxPool { wide: false } => f.write_str("max_pool"),
            BlockKind::MaxPool { wide: true } => f.write_str("max_pool_wide"),
            BlockKind::GlobalAverage => f.write_str("global_average"),
            BlockKind::NearestUpsample => f.write_str("nearest_upsample"),
        }
    }
}

/// One block of a network.
#[derive(Module, Debug)]
pub enum Block<B: Backend> {
    /// Point-wise linear block.
    Unary(UnaryBlock<B>),
    /// Single convolution block.
    Simple(SimpleBlock<B>),
    /// Residual bottleneck block.
    Resnet(ResnetBottleneckBlock<B>),
    /// Max pooling into the next level.
    MaxPool(MaxPoolBlock),
    /// Per-cloud average of the coarsest level.
    GlobalAverage(GlobalAverageBlock),
    /// Nearest upsampling from the coarser level.
    NearestUpsample(NearestUpsampleBlock),
}

impl<B: Backend> Block<B> {
    /// Forward pass.
    pub fn forward(
        &self,
        x: Tensor<B, 2>,
        batch: &GeometryBatch<B>,
    ) -> error::Result<Tensor<B, 2>> {
        self.forward_traced(x, batch).map(|(features, _)| features)
    }

    /// Forward pass that also returns the deformation trace of deformable convolutions.
    pub fn forward_traced(
        &self,
        x: Tensor<B, 2>,
        batch: &GeometryBatch<B>,
    ) -> error::Result<(Tensor<B, 2>, Option<DeformationTrace<B>>)> {
        match self {
            Block::Unary(block) => Ok((block.forward(x), None)),
            Block::Simple(block) => block.forward_traced(x, batch),
            Block::Resnet(block) => block.forward_traced(x, batch),
            Block::MaxPool(block) => Ok((block.forward(x, batch)?, None)),
            Block::GlobalAverage(block) => Ok((block.forward(x, batch)?, None)),
            Block::NearestUpsample(block) => Ok((block.forward(x, batch)?, None)),
        }
    }
}

/// Configuration of one block.
#[derive(Config, Debug)]
pub struct BlockConfig {
    /// Block name, e.g. `resnetb_deformable_strided`.
    pub name: String,
    /// Convolution radius at this level.
    pub radius: f32,
    /// Input feature dimension.
    pub in_dim: usize,
    /// Output feature dimension.
    pub out_dim: usize,
    /// Hierarchy level.
    #[config(default = 0)]
    pub layer: usize,
}

impl BlockConfig {
    /// Parse the block name.
    pub fn kind(&self) -> error::Result<BlockKind> {
        self.name.parse()
    }

    /// Build the block.
    pub fn init<B: Backend>(
        &self,
        arch: &ArchitectureConfig,
        device: &B::Device,
    ) -> error::Result<Block<B>> {
        arch.validate()?;
        let kind = self.kind()?;
        let (in_dim, out_dim, radius, layer) = (self.in_dim, self.out_dim, self.radius, self.layer);

        log::debug!("building block {kind} at layer {layer}: {in_dim} -> {out_dim}");

        let block = match kind {
            BlockKind::Unary => Block::Unary(UnaryBlock::new(
                in_dim,
                out_dim,
                arch.use_batch_norm,
                arch.batch_norm_momentum,
                true,
                device,
            )),
            BlockKind::Simple(conv) => {
                if out_dim < 2 {
                    return Err(KpError::config(format!(
                        "simple block needs at least 2 output channels, got {out_dim}"
                    )));
                }
                Block::Simple(SimpleBlock::new(
                    arch,
                    in_dim,
                    out_dim,
                    radius,
                    layer,
                    conv.deformable(),
                    conv.strided,
                    device,
                )?)
            }
            BlockKind::Resnet(conv) => {
                if out_dim < 4 {
                    return Err(KpError::config(format!(
                        "bottleneck block needs at least 4 output channels, got {out_dim}"
                    )));
                }
                Block::Resnet(ResnetBottleneckBlock::new(
                    arch,
                    in_dim,
                    out_dim,
                    radius,
                    layer,
                    conv.deformable(),
                    conv.strided,
                    device,
                )?)
            }
            BlockKind::MaxPool { .. } => Block::MaxPool(MaxPoolBlock::new(layer)),
            BlockKind::GlobalAverage => Block::GlobalAverage(GlobalAverageBlock),
            BlockKind::NearestUpsample => {
                if layer == 0 {
                    return Err(KpError::config("nearest_upsample needs a coarser level above layer 0"));
                }
                Block::NearestUpsample(NearestUpsampleBlock::new(layer))
            }
        };
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_name() {
        let names = [
            "unary",
            "simple",
            "simple_deformable",
            "simple_invariant",
            "simple_equivariant",
            "simple_strided",
            "simple_deformable_strided",
            "simple_invariant_strided",
            "simple_equivariant_strided",
            "resnetb",
            "resnetb_invariant",
            "resnetb_equivariant",
            "resnetb_deformable",
            "resnetb_strided",
            "resnetb_deformable_strided",
            "resnetb_equivariant_strided",
            "resnetb_invariant_strided",
            "max_pool",
            "max_pool_wide",
            "global_average",
            "nearest_upsample",
        ];
        for name in names {
            let kind: BlockKind = name.parse().unwrap();
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn test_parse_qualifiers() {
        let kind: BlockKind = "resnetb_deformable_strided".parse().unwrap();
        match kind {
            BlockKind::Resnet(conv) => {
                assert!(conv.deformable());
                assert!(conv.strided);
            }
            other => panic!("unexpected {other:?}"),
        }

        let kind: BlockKind = "simple_invariant".parse().unwrap();
        assert_eq!(
            kind,
            BlockKind::Simple(ConvBlockKind {
                variant: ConvVariant::Invariant,
                strided: false
            })
        );
    }

    #[test]
    fn test_rejects_unknown_names() {
        for name in ["", "resnet", "simple_strided_deformable", "max_pool_narrow", "Unary"] {
            assert!(matches!(
                name.parse::<BlockKind>(),
                Err(KpError::UnknownBlock { .. })
            ));
        }
    }
}
