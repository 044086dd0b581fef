//! Convolution operator configuration types.

use std::fmt;
use std::str::FromStr;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use kp_core::{Aggregation, FixedPoints, InfluenceFn};

use crate::error::{self, KpError};

/// Convolution operator used by simple and bottleneck blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvMethod {
    /// Kernel-point convolution.
    #[default]
    Kpconv,
    /// Tri-plane convolution sampling a dense kernel per neighbor.
    TriplaneDirect,
    /// Tri-plane convolution scoring a shared weight bank.
    TriplaneScored,
    /// Tri-plane depth-wise filter followed by a linear mix.
    TriplaneDepthwise,
}

impl ConvMethod {
    /// Canonical configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConvMethod::Kpconv => "kpconv",
            ConvMethod::TriplaneDirect => "triplane_direct",
            ConvMethod::TriplaneScored => "triplane_scored",
            ConvMethod::TriplaneDepthwise => "triplane_depthwise",
        }
    }
}

impl FromStr for ConvMethod {
    type Err = KpError;

    fn from_str(s: &str) -> error::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kpconv" => Ok(ConvMethod::Kpconv),
            "triplane" | "triplane_direct" => Ok(ConvMethod::TriplaneDirect),
            "triplane_scored" => Ok(ConvMethod::TriplaneScored),
            "triplane_depthwise" => Ok(ConvMethod::TriplaneDepthwise),
            _ => Err(KpError::UnknownConvMethod {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConvMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether kernel points are displaced per point by a learned offset head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deformation {
    /// Kernel points stay where the layout (or generator) puts them.
    #[default]
    Rigid,
    /// Offsets are predicted by an auxiliary rigid convolution.
    Deformable {
        /// Also predict one modulation scalar per kernel point.
        modulated: bool,
    },
}

impl Deformation {
    /// Whether the offset head is present.
    pub fn is_deformable(self) -> bool {
        matches!(self, Deformation::Deformable { .. })
    }
}

/// Where kernel-point positions come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelSource {
    /// Canonical layout loaded once at construction.
    #[default]
    Fixed,
    /// Generated per point from the padded, flattened neighbor offsets.
    Generative {
        /// Width the neighbor list is padded to before the generator.
        max_neighbors: usize,
    },
}

/// Strategy of the tri-plane convolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriplaneStrategy {
    /// Dense `cin x cout` kernel per (point, neighbor).
    #[default]
    Direct,
    /// `m` scores per (point, neighbor) combined with a shared weight bank.
    Scored {
        /// Number of kernels in the weight bank.
        bank_size: usize,
    },
    /// Per-channel filter applied to the nearest neighbor's feature.
    DepthWise,
}

/// Tri-plane field settings shared by every layer of a network.
#[derive(Config, Debug, PartialEq)]
pub struct TriplaneSettings {
    /// Plane resolution at level 0.
    #[config(default = 128)]
    pub base_grid_size: usize,

    /// Number of low-rank components per plane.
    #[config(default = 8)]
    pub components: usize,

    /// Halve the plane resolution per hierarchy level.
    #[config(default = true)]
    pub level_scaling: bool,

    /// Sum the three plane samples instead of running the mapping.
    #[config(default = false)]
    pub no_mapping: bool,

    /// Hidden layer widths of the factor-to-weight mapping.
    #[config(default = "vec![]")]
    pub hidden_dims: Vec<usize>,

    /// Standard deviation of the plane initialization.
    #[config(default = 0.1)]
    pub init_scale: f64,
}

impl TriplaneSettings {
    /// Plane resolution for a hierarchy level.
    pub fn grid_size(&self, layer: usize) -> usize {
        if self.level_scaling {
            self.base_grid_size >> layer.min(usize::BITS as usize - 1)
        } else {
            self.base_grid_size
        }
    }

    /// Resolve the field configuration for one operator.
    pub fn field(&self, layer: usize, out_width: usize) -> TriplaneFieldConfig {
        TriplaneFieldConfig::new(self.grid_size(layer), self.components, out_width)
            .with_no_mapping(self.no_mapping)
            .with_hidden_dims(self.hidden_dims.clone())
            .with_init_scale(self.init_scale)
    }
}

/// Configuration of one tri-plane tensor field.
#[derive(Config, Debug, PartialEq)]
pub struct TriplaneFieldConfig {
    /// Plane resolution (nodes per side).
    pub grid_size: usize,

    /// Number of low-rank components per plane.
    pub components: usize,

    /// Width of the mapped output.
    pub out_width: usize,

    /// Sum the three plane samples instead of running the mapping.
    #[config(default = false)]
    pub no_mapping: bool,

    /// Hidden layer widths of the mapping.
    #[config(default = "vec![]")]
    pub hidden_dims: Vec<usize>,

    /// Standard deviation of the plane initialization.
    #[config(default = 0.1)]
    pub init_scale: f64,
}

impl TriplaneFieldConfig {
    /// Width the field actually produces.
    pub fn output_width(&self) -> usize {
        if self.no_mapping {
            self.components
        } else {
            self.out_width
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> error::Result<()> {
        if self.grid_size < 2 {
            return Err(KpError::config(format!(
                "tri-plane grid size must be at least 2 for bilinear sampling, got {}",
                self.grid_size
            )));
        }
        if self.components == 0 {
            return Err(KpError::config("tri-plane component count must be positive"));
        }
        if self.no_mapping && self.out_width != self.components {
            return Err(KpError::config(format!(
                "without a mapping the field yields {} components but {} outputs were requested",
                self.components, self.out_width
            )));
        }
        Ok(())
    }
}

/// Source of the per-kernel-point weight matrices of a kernel-point convolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum KernelWeights {
    /// One learned `cin x cout` matrix per kernel point.
    #[default]
    Static,
    /// Matrices sampled from a tri-plane field at the kernel-point positions.
    Triplane(TriplaneSettings),
}

/// Configuration for a kernel-point convolution.
#[derive(Config, Debug)]
pub struct KpConvConfig {
    /// Number of kernel points.
    pub kernel_count: usize,

    /// Input feature dimension.
    pub in_channels: usize,

    /// Output feature dimension.
    pub out_channels: usize,

    /// Influence radius of each kernel point.
    pub extent: f32,

    /// Radius used to lay out the kernel points.
    pub radius: f32,

    /// Hierarchy level of the operator.
    #[config(default = 0)]
    pub layer: usize,

    /// Pinned kernel points.
    #[config(default = "FixedPoints::Center")]
    pub fixed_points: FixedPoints,

    /// Influence function of the kernel points.
    #[config(default = "InfluenceFn::Linear")]
    pub influence: InfluenceFn,

    /// Aggregation of kernel-point contributions.
    #[config(default = "Aggregation::Sum")]
    pub aggregation: Aggregation,

    /// Deformable kernel points.
    #[config(default = "Deformation::Rigid")]
    pub deformation: Deformation,

    /// Fixed or generated kernel points.
    #[config(default = "KernelSource::Fixed")]
    pub kernel_source: KernelSource,

    /// Static or tri-plane kernel weights.
    #[config(default = "KernelWeights::Static")]
    pub weights: KernelWeights,
}

impl KpConvConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> error::Result<()> {
        if self.kernel_count == 0 {
            return Err(KpError::config("kernel_count must be positive"));
        }
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(KpError::config("channel counts must be positive"));
        }
        if !(self.extent > 0.0) {
            return Err(KpError::config("extent must be positive"));
        }
        if !(self.radius > 0.0) {
            return Err(KpError::config("radius must be positive"));
        }
        if let KernelSource::Generative { max_neighbors: 0 } = self.kernel_source {
            return Err(KpError::config("generative kernel points need a positive neighbor width"));
        }
        if let KernelWeights::Triplane(settings) = &self.weights {
            settings
                .field(self.layer, self.in_channels * self.out_channels)
                .validate()?;
        }
        Ok(())
    }

    /// Width of the offset head output: 3 offsets (+1 modulation) per kernel point.
    pub fn offset_dim(&self) -> Option<usize> {
        match self.deformation {
            Deformation::Rigid => None,
            Deformation::Deformable { modulated: false } => Some(3 * self.kernel_count),
            Deformation::Deformable { modulated: true } => Some(4 * self.kernel_count),
        }
    }
}

/// Configuration for a tri-plane convolution.
#[derive(Config, Debug)]
pub struct TriplaneConvConfig {
    /// Input feature dimension.
    pub in_channels: usize,

    /// Output feature dimension.
    pub out_channels: usize,

    /// Hierarchy level of the operator.
    #[config(default = 0)]
    pub layer: usize,

    /// Convolution strategy.
    #[config(default = "TriplaneStrategy::Direct")]
    pub strategy: TriplaneStrategy,

    /// Tri-plane field settings.
    #[config(default = "TriplaneSettings::new()")]
    pub field: TriplaneSettings,
}

impl TriplaneConvConfig {
    /// Width the tri-plane field must produce for the strategy.
    pub fn field_width(&self) -> usize {
        match self.strategy {
            TriplaneStrategy::Direct => self.in_channels * self.out_channels,
            TriplaneStrategy::Scored { bank_size } => bank_size,
            TriplaneStrategy::DepthWise => self.in_channels,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> error::Result<()> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(KpError::config("channel counts must be positive"));
        }
        if let TriplaneStrategy::Scored { bank_size: 0 } = self.strategy {
            return Err(KpError::config("weight bank size must be positive"));
        }
        self.field.field(self.layer, self.field_width()).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_method_parse() {
        assert_eq!("KPConv".parse::<ConvMethod>().unwrap(), ConvMethod::Kpconv);
        assert_eq!(
            "triplane".parse::<ConvMethod>().unwrap(),
            ConvMethod::TriplaneDirect
        );
        assert!(matches!(
            "pointnet".parse::<ConvMethod>(),
            Err(KpError::UnknownConvMethod { .. })
        ));
    }

    #[test]
    fn test_grid_size_scales_with_level() {
        let settings = TriplaneSettings::new();
        assert_eq!(settings.grid_size(0), 128);
        assert_eq!(settings.grid_size(1), 64);
        assert_eq!(settings.grid_size(4), 8);

        let flat = TriplaneSettings::new().with_level_scaling(false);
        assert_eq!(flat.grid_size(4), 128);
    }

    #[test]
    fn test_field_validation() {
        let ok = TriplaneFieldConfig::new(4, 8, 16);
        assert!(ok.validate().is_ok());

        let tiny = TriplaneFieldConfig::new(1, 8, 16);
        assert!(tiny.validate().is_err());

        // Level scaling can collapse the grid below 2 nodes
        let settings = TriplaneSettings::new().with_base_grid_size(8);
        assert!(settings.field(3, 4).validate().is_err());

        let unmapped = TriplaneFieldConfig::new(4, 8, 16).with_no_mapping(true);
        assert!(unmapped.validate().is_err());
        assert_eq!(unmapped.output_width(), 8);
    }

    #[test]
    fn test_kpconv_validation() {
        let config = KpConvConfig::new(15, 8, 16, 1.2, 2.5);
        assert!(config.validate().is_ok());
        assert_eq!(config.offset_dim(), None);

        let deformable = config
            .clone()
            .with_deformation(Deformation::Deformable { modulated: true });
        assert_eq!(deformable.offset_dim(), Some(60));

        let bad = config.clone().with_kernel_source(KernelSource::Generative { max_neighbors: 0 });
        assert!(bad.validate().is_err());

        let zero_extent = KpConvConfig::new(15, 8, 16, 0.0, 2.5);
        assert!(zero_extent.validate().is_err());
    }

    #[test]
    fn test_triplane_field_width() {
        let direct = TriplaneConvConfig::new(4, 6);
        assert_eq!(direct.field_width(), 24);

        let scored = direct
            .clone()
            .with_strategy(TriplaneStrategy::Scored { bank_size: 8 });
        assert_eq!(scored.field_width(), 8);

        let depthwise = direct.with_strategy(TriplaneStrategy::DepthWise);
        assert_eq!(depthwise.field_width(), 4);
    }
}
