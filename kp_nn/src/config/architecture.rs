//! Network-wide settings shared by every block.

use burn::config::Config;

use kp_core::{Aggregation, FixedPoints, InfluenceFn, KpCoreError};

use super::conv::{
    ConvMethod, Deformation, KernelSource, KernelWeights, KpConvConfig, TriplaneConvConfig,
    TriplaneSettings, TriplaneStrategy,
};
use crate::error::{self, KpError};

/// Settings the block factory reads when building a network.
#[derive(Config, Debug)]
pub struct ArchitectureConfig {
    /// Convolution operator of simple and bottleneck blocks.
    #[config(default = "ConvMethod::Kpconv")]
    pub method: ConvMethod,

    /// Number of kernel points.
    #[config(default = 15)]
    pub num_kernel_points: usize,

    /// Dimension of the point space.
    #[config(default = 3)]
    pub in_points_dim: usize,

    /// Pinned kernel points.
    #[config(default = "FixedPoints::Center")]
    pub fixed_kernel_points: FixedPoints,

    /// Kernel-point influence function.
    #[config(default = "InfluenceFn::Linear")]
    pub influence: InfluenceFn,

    /// Aggregation of kernel-point contributions.
    #[config(default = "Aggregation::Sum")]
    pub aggregation: Aggregation,

    /// Predict a modulation per deformed kernel point.
    #[config(default = false)]
    pub modulated: bool,

    /// Use batch normalization; a learned bias otherwise.
    #[config(default = true)]
    pub use_batch_norm: bool,

    /// Batch normalization momentum.
    #[config(default = 0.02)]
    pub batch_norm_momentum: f64,

    /// Kernel radius in units of the first subsampling cell.
    #[config(default = 2.5)]
    pub conv_radius: f32,

    /// Kernel-point influence extent in units of the first subsampling cell.
    #[config(default = 1.2)]
    pub kp_extent: f32,

    /// Sample KPConv kernel weights from a tri-plane field.
    #[config(default = false)]
    pub triplane_kernel_weights: bool,

    /// Tri-plane field settings.
    #[config(default = "TriplaneSettings::new()")]
    pub triplane: TriplaneSettings,

    /// Weight bank size of the scored tri-plane strategy.
    #[config(default = 8)]
    pub scored_bank_size: usize,

    /// Generate kernel points from the neighborhood.
    #[config(default = false)]
    pub generative_kernel_points: bool,

    /// Neighbor table width per level, used by the kernel generator.
    #[config(default = "vec![28, 32, 41, 40, 36]")]
    pub neighbor_limits: Vec<usize>,
}

impl ArchitectureConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> error::Result<()> {
        if self.in_points_dim != 3 {
            return Err(KpCoreError::UnsupportedDimension {
                dimension: self.in_points_dim,
            }
            .into());
        }
        if self.num_kernel_points == 0 {
            return Err(KpError::config("num_kernel_points must be positive"));
        }
        if !(self.conv_radius > 0.0) || !(self.kp_extent > 0.0) {
            return Err(KpError::config("conv_radius and kp_extent must be positive"));
        }
        if !(self.batch_norm_momentum > 0.0 && self.batch_norm_momentum <= 1.0) {
            return Err(KpError::config(format!(
                "batch_norm_momentum must be in (0, 1], got {}",
                self.batch_norm_momentum
            )));
        }
        if self.method == ConvMethod::TriplaneScored && self.scored_bank_size == 0 {
            return Err(KpError::config("scored_bank_size must be positive"));
        }
        Ok(())
    }

    /// Influence extent of a kernel at the given radius.
    pub fn extent(&self, radius: f32) -> f32 {
        radius * self.kp_extent / self.conv_radius
    }

    /// Kernel-point convolution settings for one block.
    pub fn kpconv(
        &self,
        in_channels: usize,
        out_channels: usize,
        radius: f32,
        layer: usize,
        deformable: bool,
    ) -> error::Result<KpConvConfig> {
        let deformation = if deformable {
            Deformation::Deformable {
                modulated: self.modulated,
            }
        } else {
            Deformation::Rigid
        };

        let kernel_source = if self.generative_kernel_points {
            let max_neighbors = *self.neighbor_limits.get(layer).ok_or_else(|| {
                KpError::config(format!("no neighbor limit configured for layer {layer}"))
            })?;
            KernelSource::Generative { max_neighbors }
        } else {
            KernelSource::Fixed
        };

        let weights = if self.triplane_kernel_weights {
            KernelWeights::Triplane(self.triplane.clone())
        } else {
            KernelWeights::Static
        };

        Ok(KpConvConfig::new(
            self.num_kernel_points,
            in_channels,
            out_channels,
            self.extent(radius),
            radius,
        )
        .with_layer(layer)
        .with_fixed_points(self.fixed_kernel_points)
        .with_influence(self.influence)
        .with_aggregation(self.aggregation)
        .with_deformation(deformation)
        .with_kernel_source(kernel_source)
        .with_weights(weights))
    }

    /// Tri-plane convolution settings for one block, or `None` for KPConv.
    pub fn triplane_conv(
        &self,
        in_channels: usize,
        out_channels: usize,
        layer: usize,
    ) -> Option<TriplaneConvConfig> {
        let strategy = match self.method {
            ConvMethod::Kpconv => return None,
            ConvMethod::TriplaneDirect => TriplaneStrategy::Direct,
            ConvMethod::TriplaneScored => TriplaneStrategy::Scored {
                bank_size: self.scored_bank_size,
            },
            ConvMethod::TriplaneDepthwise => TriplaneStrategy::DepthWise,
        };
        Some(
            TriplaneConvConfig::new(in_channels, out_channels)
                .with_layer(layer)
                .with_strategy(strategy)
                .with_field(self.triplane.clone()),
        )
    }
}
