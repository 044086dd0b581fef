//! Kernel-point influence functions and aggregation modes.
//!
//! The scalar definitions here are the reference for the batched versions in
//! `kp_nn`. Both operate on squared distances so the linear mode is the only
//! one that needs a square root.

use alloc::string::ToString;
use core::fmt;
use core::str::FromStr;

use crate::error::KpCoreError;

/// Gaussian sigma as a fraction of the influence extent.
pub const GAUSSIAN_SIGMA_RATIO: f32 = 0.3;

/// Additive epsilon on the gaussian variance term.
pub const GAUSSIAN_EPSILON: f32 = 1e-9;

/// How a kernel point's influence decays with distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InfluenceFn {
    /// Every neighbor gets an influence of 1.
    Constant,
    /// `max(0, 1 - d / extent)`, reaching zero at the extent.
    #[default]
    Linear,
    /// `exp(-d² / (2σ²))` with `σ = 0.3 * extent`.
    Gaussian,
}

impl InfluenceFn {
    /// Influence of a kernel point on a neighbor at squared distance `sq_distance`.
    #[inline]
    pub fn weight(self, sq_distance: f32, extent: f32) -> f32 {
        match self {
            InfluenceFn::Constant => 1.0,
            InfluenceFn::Linear => linear_influence(sq_distance, extent),
            InfluenceFn::Gaussian => gaussian_influence(sq_distance, GAUSSIAN_SIGMA_RATIO * extent),
        }
    }

    /// Canonical configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            InfluenceFn::Constant => "constant",
            InfluenceFn::Linear => "linear",
            InfluenceFn::Gaussian => "gaussian",
        }
    }
}

impl FromStr for InfluenceFn {
    type Err = KpCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(InfluenceFn::Constant),
            "linear" => Ok(InfluenceFn::Linear),
            "gaussian" => Ok(InfluenceFn::Gaussian),
            other => Err(KpCoreError::UnknownInfluence {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for InfluenceFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the contributions of several kernel points to one neighbor combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Aggregation {
    /// All kernel points contribute.
    #[default]
    Sum,
    /// Only the nearest kernel point of each neighbor contributes.
    Closest,
}

impl Aggregation {
    /// Canonical configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Closest => "closest",
        }
    }
}

impl FromStr for Aggregation {
    type Err = KpCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Aggregation::Sum),
            "closest" => Ok(Aggregation::Closest),
            other => Err(KpCoreError::UnknownAggregation {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear influence: `max(0, 1 - sqrt(d²) / extent)`.
#[inline]
pub fn linear_influence(sq_distance: f32, extent: f32) -> f32 {
    let w = 1.0 - libm::sqrtf(sq_distance) / extent;
    if w > 0.0 {
        w
    } else {
        0.0
    }
}

/// Gaussian of the distance: `exp(-d² / (2σ² + ε))`.
#[inline]
pub fn gaussian_influence(sq_distance: f32, sigma: f32) -> f32 {
    libm::expf(-sq_distance / (2.0 * sigma * sigma + GAUSSIAN_EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_endpoints() {
        assert_eq!(linear_influence(0.0, 1.0), 1.0);
        assert_eq!(linear_influence(1.0, 1.0), 0.0);
        assert_eq!(linear_influence(4.0, 1.0), 0.0);
        assert!((linear_influence(0.25, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_gaussian_shape() {
        let sigma = 0.3;
        assert!((gaussian_influence(0.0, sigma) - 1.0).abs() < 1e-6);

        let near = gaussian_influence(0.01, sigma);
        let far = gaussian_influence(0.5, sigma);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_finite() {
        let w = gaussian_influence(0.0, 0.0);
        assert!(w.is_finite());
        let w = gaussian_influence(1.0, 0.0);
        assert!(w.is_finite());
    }

    #[test]
    fn test_constant_ignores_distance() {
        assert_eq!(InfluenceFn::Constant.weight(0.0, 1.0), 1.0);
        assert_eq!(InfluenceFn::Constant.weight(100.0, 1.0), 1.0);
    }

    #[test]
    fn test_parse_round_trip() {
        for f in [InfluenceFn::Constant, InfluenceFn::Linear, InfluenceFn::Gaussian] {
            assert_eq!(f.as_str().parse::<InfluenceFn>().unwrap(), f);
        }
        for a in [Aggregation::Sum, Aggregation::Closest] {
            assert_eq!(a.as_str().parse::<Aggregation>().unwrap(), a);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            "cubic".parse::<InfluenceFn>(),
            Err(KpCoreError::UnknownInfluence { .. })
        ));
        assert!(matches!(
            "max".parse::<Aggregation>(),
            Err(KpCoreError::UnknownAggregation { .. })
        ));
    }
}
