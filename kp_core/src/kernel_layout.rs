//! Kernel-point layout provider.
//!
//! Convolution operators consume a canonical kernel disposition once, at
//! construction. The trait lets downstream crates plug in precomputed,
//! optimized dispositions; [`SphericalLayout`] is the deterministic default.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::KpCoreError;
use crate::types::Point3;

/// Kernel points whose position is pinned regardless of the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FixedPoints {
    /// No pinned point.
    None,
    /// Kernel point 0 sits at the convolution center.
    #[default]
    Center,
    /// Center, plus kernel points 1 and 2 on the vertical axis (+z, -z).
    Verticals,
}

impl FixedPoints {
    /// Number of kernel points the policy pins.
    pub const fn pinned(self) -> usize {
        match self {
            FixedPoints::None => 0,
            FixedPoints::Center => 1,
            FixedPoints::Verticals => 3,
        }
    }

    /// Canonical configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            FixedPoints::None => "none",
            FixedPoints::Center => "center",
            FixedPoints::Verticals => "verticals",
        }
    }
}

impl FromStr for FixedPoints {
    type Err = KpCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FixedPoints::None),
            "center" => Ok(FixedPoints::Center),
            "verticals" => Ok(FixedPoints::Verticals),
            other => Err(KpCoreError::UnknownFixedPoints {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FixedPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for types that provide canonical kernel-point dispositions.
///
/// Implementors return `count` offsets from the convolution center, all
/// within `radius`. The first `fixed.pinned()` entries follow the policy.
pub trait KernelLayoutProvider {
    /// Produce the kernel-point offsets.
    ///
    /// # Arguments
    /// * `radius` - Radius of the convolution
    /// * `count` - Number of kernel points
    /// * `dimension` - Dimension of the point space
    /// * `fixed` - Pinned-point policy
    fn layout(
        &self,
        radius: f32,
        count: usize,
        dimension: usize,
        fixed: FixedPoints,
    ) -> Result<Vec<Point3>, KpCoreError>;
}

/// Deterministic spherical disposition.
///
/// Free kernel points are spread on a Fibonacci spiral over a shell of radius
/// `radius * shell_ratio`; pinned points are placed first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalLayout {
    /// Shell radius as a fraction of the convolution radius.
    pub shell_ratio: f32,
}

impl Default for SphericalLayout {
    fn default() -> Self {
        Self { shell_ratio: 0.66 }
    }
}

impl SphericalLayout {
    /// Create a layout with a custom shell ratio.
    pub fn new(shell_ratio: f32) -> Self {
        Self { shell_ratio }
    }

    fn fibonacci_shell(count: usize, shell: f32, out: &mut Vec<Point3>) {
        let golden_angle = core::f32::consts::PI * (3.0 - libm::sqrtf(5.0));

        for i in 0..count {
            let z = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let ring = libm::sqrtf((1.0 - z * z).max(0.0));
            let theta = golden_angle * i as f32;
            out.push(Point3::new(
                libm::cosf(theta) * ring * shell,
                libm::sinf(theta) * ring * shell,
                z * shell,
            ));
        }
    }
}

impl KernelLayoutProvider for SphericalLayout {
    fn layout(
        &self,
        radius: f32,
        count: usize,
        dimension: usize,
        fixed: FixedPoints,
    ) -> Result<Vec<Point3>, KpCoreError> {
        if dimension != 3 {
            return Err(KpCoreError::UnsupportedDimension { dimension });
        }
        let min = fixed.pinned().max(1);
        if count < min {
            return Err(KpCoreError::InvalidKernelCount { count, min });
        }

        let shell = radius * self.shell_ratio;
        let mut points = Vec::with_capacity(count);

        match fixed {
            FixedPoints::None => {}
            FixedPoints::Center => points.push(Point3::splat(0.0)),
            FixedPoints::Verticals => {
                points.push(Point3::splat(0.0));
                points.push(Point3::new(0.0, 0.0, shell));
                points.push(Point3::new(0.0, 0.0, -shell));
            }
        }

        Self::fibonacci_shell(count - points.len(), shell, &mut points);

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_policy() {
        let layout = SphericalLayout::default()
            .layout(2.0, 15, 3, FixedPoints::Center)
            .unwrap();

        assert_eq!(layout.len(), 15);
        assert_eq!(layout[0], Point3::splat(0.0));
        for p in &layout[1..] {
            assert!((p.length() - 2.0 * 0.66).abs() < 1e-4);
        }
    }

    #[test]
    fn test_verticals_policy() {
        let layout = SphericalLayout::new(0.5)
            .layout(1.0, 10, 3, FixedPoints::Verticals)
            .unwrap();

        assert_eq!(layout[0], Point3::splat(0.0));
        assert_eq!(layout[1], Point3::new(0.0, 0.0, 0.5));
        assert_eq!(layout[2], Point3::new(0.0, 0.0, -0.5));
        assert_eq!(layout.len(), 10);
    }

    #[test]
    fn test_none_policy_uses_shell_only() {
        let layout = SphericalLayout::default()
            .layout(1.0, 8, 3, FixedPoints::None)
            .unwrap();

        assert_eq!(layout.len(), 8);
        assert!(layout.iter().all(|p| p.length() > 0.5));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let a = SphericalLayout::default()
            .layout(1.0, 15, 3, FixedPoints::Center)
            .unwrap();
        let b = SphericalLayout::default()
            .layout(1.0, 15, 3, FixedPoints::Center)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shell_points_are_distinct() {
        let layout = SphericalLayout::default()
            .layout(1.0, 15, 3, FixedPoints::None)
            .unwrap();

        for i in 0..layout.len() {
            for j in (i + 1)..layout.len() {
                assert!(layout[i].distance_squared(layout[j]) > 1e-4);
            }
        }
    }

    #[test]
    fn test_invalid_requests() {
        let provider = SphericalLayout::default();
        assert!(matches!(
            provider.layout(1.0, 15, 2, FixedPoints::Center),
            Err(KpCoreError::UnsupportedDimension { dimension: 2 })
        ));
        assert!(matches!(
            provider.layout(1.0, 2, 3, FixedPoints::Verticals),
            Err(KpCoreError::InvalidKernelCount { count: 2, min: 3 })
        ));
        assert!(matches!(
            provider.layout(1.0, 0, 3, FixedPoints::None),
            Err(KpCoreError::InvalidKernelCount { count: 0, min: 1 })
        ));
    }

    #[test]
    fn test_fixed_points_parse() {
        assert_eq!("verticals".parse::<FixedPoints>().unwrap(), FixedPoints::Verticals);
        assert!("corners".parse::<FixedPoints>().is_err());
    }
}
