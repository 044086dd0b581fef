//! # kp_nn
//!
//! Kernel-point and tri-plane point convolutions with Burn.
//!
//! This crate evaluates the definitions of `kp_core` as batched tensor
//! operations: shadow-padded neighbor gathers, deformable kernel-point
//! convolution, tri-plane tensor-field convolution, and the composite blocks
//! that assemble them into a point-cloud backbone.
//!
//! ## Features
//!
//! - **Validated neighbor tables**: `NeighborTable<B>` rejects indices past the shadow sentinel
//! - **KPConv**: fixed or generated kernel points, optional deformation and modulation,
//!   static or tri-plane kernel weights
//! - **TriplaneConv**: direct, scored and depth-wise strategies
//! - **Blocks**: unary, simple, residual bottleneck, pooling, upsampling, global average
//! - **Deformation losses**: fitting and repulsion over the returned deformation trace
//!
//! ## Quick Start
//!
//! ```ignore
//! use kp_nn::prelude::*;
//! use burn::backend::NdArray;
//!
//! let device = Default::default();
//! let arch = ArchitectureConfig::new();
//! let block = BlockConfig::new("resnetb_strided".to_string(), 0.1, 64, 128)
//!     .init::<NdArray>(&arch, &device)?;
//!
//! // `batch` comes from the neighbor search
//! let features = block.forward(features, &batch)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! kp_core (pure math, no_std)
//!     │  layouts, influence, host neighbor tables, bilinear taps
//!     ▼
//! kp_nn (burn)
//!     ops ──► field ──► conv ──► blocks
//!                         │
//!                         └──► loss (deformation trace)
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU
//! - `autodiff`: Autodiff backend decorator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod blocks;
pub mod config;
pub mod conv;
pub mod error;
pub mod field;
pub mod loss;
pub mod nn;
pub mod ops;

// Re-export key types for convenience
pub use batch::{GeometryBatch, LayerGeometry};
pub use blocks::{Block, BlockConfig, BlockKind};
pub use config::{ArchitectureConfig, ConvMethod, KpConvConfig, TriplaneConvConfig};
pub use conv::{DeformationTrace, KpConv, KpConvOutput, TriplaneConv};
pub use error::{KpError, Result};
pub use ops::NeighborTable;

// Re-export from kp_core for convenience
pub use kp_core::{Aggregation, FixedPoints, InfluenceFn, NeighborRows, Point3};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{GeometryBatch, LayerGeometry};
    pub use crate::blocks::{
        BatchNormBlock, Block, BlockConfig, BlockKind, ConvBlockKind, ConvVariant,
        GlobalAverageBlock, MaxPoolBlock, NearestUpsampleBlock, ResnetBottleneckBlock,
        SimpleBlock, UnaryBlock,
    };
    pub use crate::config::{
        ArchitectureConfig, ConvMethod, Deformation, KernelSource, KernelWeights, KpConvConfig,
        TriplaneConvConfig, TriplaneFieldConfig, TriplaneSettings, TriplaneStrategy,
    };
    pub use crate::conv::{ConvOperator, DeformationTrace, KpConv, KpConvOutput, TriplaneConv};
    pub use crate::error::{KpError, Result};
    pub use crate::field::TriplaneField;
    pub use crate::loss::{DeformationLoss, DeformationLossConfig};
    pub use crate::nn::{Mlp, MlpConfig};
    pub use crate::ops::{
        closest_pool, gather_padded, gather_rows, gather_rows_2d, gather_rows_nd, global_average,
        max_pool, NeighborTable,
    };

    pub use kp_core::{
        Aggregation, FixedPoints, InfluenceFn, KernelLayoutProvider, NeighborRows, Point3,
        SphericalLayout,
    };
}
