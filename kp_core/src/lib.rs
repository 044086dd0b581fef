//! # kp_core
//!
//! Pure mathematical building blocks for kernel-point and tri-plane point
//! convolutions.
//!
//! This crate has no tensor runtime. It holds the scalar definitions that the
//! tensor crate (`kp_nn`) evaluates in batch, plus the host-side index
//! bookkeeping that is easier to express over plain slices.
//!
//! ## Features
//!
//! - **no_std compatible**: only `alloc` is required
//! - **Kernel layouts**: deterministic spherical kernel-point dispositions
//! - **Influence functions**: constant, linear and gaussian kernel-point influence
//! - **Shadow-aware neighbor tables**: `Option` slots instead of magic indices
//! - **Aligned-corner bilinear taps**: the exact sampling convention of the tri-plane field
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables standard library support (`std::error::Error`)
//! - `serde`: Serialize/deserialize the configuration enums
//!
//! ## Modules
//!
//! - [`types`]: `Point3` and the shadow coordinate constant
//! - [`kernel_layout`]: Kernel-point layout provider trait and the spherical layout
//! - [`influence`]: Influence functions and aggregation modes
//! - [`neighbors`]: Host neighbor tables, bounds validation, in-range re-packing
//! - [`bilinear`]: Bilinear taps on a square grid with aligned corners
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```
//! use kp_core::prelude::*;
//!
//! let layout = SphericalLayout::default()
//!     .layout(1.0, 15, 3, FixedPoints::Center)
//!     .unwrap();
//! assert_eq!(layout.len(), 15);
//! assert_eq!(layout[0], Point3::splat(0.0));
//!
//! let w = InfluenceFn::Linear.weight(0.25, 0.5);
//! assert!((w - 0.0).abs() < 1e-6);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bilinear;
pub mod error;
pub mod influence;
pub mod kernel_layout;
pub mod neighbors;
pub mod types;

/// Prelude module for convenient imports.
///
/// Provides the most commonly used types and functions.
pub mod prelude {
    pub use crate::bilinear::{aligned_taps, sample_grid, BilinearTaps, CLAMP_EPSILON};
    pub use crate::error::KpCoreError;
    pub use crate::influence::{
        gaussian_influence, linear_influence, Aggregation, InfluenceFn, GAUSSIAN_EPSILON,
        GAUSSIAN_SIGMA_RATIO,
    };
    pub use crate::kernel_layout::{FixedPoints, KernelLayoutProvider, SphericalLayout};
    pub use crate::neighbors::{repack_in_range, validate_indices, NeighborRows, Repacked};
    pub use crate::types::{Point3, SHADOW_COORDINATE};
}

pub use bilinear::{aligned_taps, sample_grid, BilinearTaps, CLAMP_EPSILON};
pub use error::KpCoreError;
pub use influence::{
    gaussian_influence, linear_influence, Aggregation, InfluenceFn, GAUSSIAN_EPSILON,
    GAUSSIAN_SIGMA_RATIO,
};
pub use kernel_layout::{FixedPoints, KernelLayoutProvider, SphericalLayout};
pub use neighbors::{repack_in_range, validate_indices, NeighborRows, Repacked};
pub use types::{Point3, SHADOW_COORDINATE};

/// Result type for kp_core operations.
pub type Result<T> = core::result::Result<T, KpCoreError>;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_shell_kernels_do_not_reach_center() {
        let radius = 1.0;
        let extent = 0.6;
        let layout = SphericalLayout::default()
            .layout(radius, 15, 3, FixedPoints::Center)
            .unwrap();

        // A neighbor at the convolution center only sees the center kernel point
        let center = Point3::splat(0.0);
        let weights: alloc::vec::Vec<f32> = layout
            .iter()
            .map(|kp| InfluenceFn::Linear.weight((*kp - center).length_squared(), extent))
            .collect();

        assert_eq!(weights[0], 1.0);
        assert!(weights[1..].iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_repack_then_validate() {
        let rows = NeighborRows::from_rows(
            4,
            3,
            &[
                vec![Some(0), Some(1), Some(2)],
                vec![Some(3), None, None],
            ],
        )
        .unwrap();

        let indices = rows.to_indices();
        validate_indices(&indices, rows.support_len()).unwrap();

        let mask = [true, false, true, false, false, false];
        let repacked = repack_in_range(&indices, &mask, 2, 3, rows.sentinel());
        assert_eq!(repacked.width, 2);
        validate_indices(&repacked.indices, rows.support_len()).unwrap();
    }
}
