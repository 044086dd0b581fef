//! Continuous weight fields.

mod triplane;

pub use triplane::{TriplaneField, PLANE_AXES};
