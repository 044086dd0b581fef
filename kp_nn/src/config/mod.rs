//! Configuration types for kp_nn.
//!
//! Burn-style configuration structs: defaults via `#[config(default = ...)]`,
//! `with_*` builders, JSON save/load, and a `validate()` per struct.

mod architecture;
mod conv;

pub use architecture::ArchitectureConfig;
pub use conv::{
    ConvMethod, Deformation, KernelSource, KernelWeights, KpConvConfig, TriplaneConvConfig,
    TriplaneFieldConfig, TriplaneSettings, TriplaneStrategy,
};
