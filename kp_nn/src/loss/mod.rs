//! Loss terms for deformable convolutions.
//!
//! - Fitting: deformed kernel points should stay close to input points
//! - Repulsion: deformed kernel points should not collapse onto each other

mod deformation;

pub use deformation::{DeformationLoss, DeformationLossConfig};
