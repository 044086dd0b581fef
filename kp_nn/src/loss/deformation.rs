//! Regularization of deformable kernel points.
//!
//! Deformed kernel points should stay close to the input points (fitting)
//! and away from each other (repulsion). Both terms work in units of the
//! convolution extent.

use burn::config::Config;
use burn::prelude::*;

use crate::conv::DeformationTrace;
use crate::error::{self, KpError};

/// Configuration for [`DeformationLoss`].
#[derive(Config, Debug)]
pub struct DeformationLossConfig {
    /// Weight of the fitting term.
    #[config(default = 1.0)]
    pub fitting_weight: f32,

    /// Weight of the repulsive term.
    #[config(default = 1.0)]
    pub repulsive_weight: f32,

    /// Distance, in extents, below which kernel points repel each other.
    #[config(default = 1.2)]
    pub repulse_extent: f32,
}

impl DeformationLossConfig {
    /// Initialize the loss.
    pub fn init(&self) -> error::Result<DeformationLoss> {
        if self.fitting_weight < 0.0 || self.repulsive_weight < 0.0 {
            return Err(KpError::config("deformation loss weights must be non-negative"));
        }
        if !(self.repulse_extent > 0.0) {
            return Err(KpError::config("repulse_extent must be positive"));
        }
        Ok(DeformationLoss {
            fitting_weight: self.fitting_weight,
            repulsive_weight: self.repulsive_weight,
            repulse_extent: self.repulse_extent,
        })
    }
}

/// Fitting and repulsive losses over deformation traces.
#[derive(Debug, Clone)]
pub struct DeformationLoss {
    fitting_weight: f32,
    repulsive_weight: f32,
    repulse_extent: f32,
}

impl DeformationLoss {
    /// Mean squared distance from each kernel point to its closest neighbor, in extents².
    ///
    /// Output: scalar loss
    pub fn fitting<B: Backend>(&self, trace: &DeformationTrace<B>) -> Tensor<B, 1> {
        let extent_sq = trace.extent * trace.extent;
        trace.min_d2.clone().div_scalar(extent_sq).mean()
    }

    /// Squared hinge on kernel-point pairs closer than the repulse extent.
    ///
    /// For every point, sums `max(repulse_extent - d_ij, 0)²` over all
    /// ordered pairs `i != j`, divides by the kernel count, and averages
    /// over points.
    ///
    /// Output: scalar loss
    pub fn repulsive<B: Backend>(&self, trace: &DeformationTrace<B>) -> Tensor<B, 1> {
        let [n, k, _] = trace.deformed_points.dims();
        let device = trace.deformed_points.device();
        let points = trace.deformed_points.clone().div_scalar(trace.extent);

        let diff = points.clone().unsqueeze_dim::<4>(2) - points.unsqueeze_dim::<4>(1);
        let sq = (diff.clone() * diff).sum_dim(3).reshape([n, k, k]);

        // The diagonal is pushed past the hinge so sqrt never sees a zero there
        let diagonal = Tensor::<B, 2>::eye(k, &device)
            .equal_elem(1.0)
            .unsqueeze_dim::<3>(0)
            .expand([n, k, k]);
        let far = 4.0 * self.repulse_extent * self.repulse_extent;
        let dist = sq.mask_fill(diagonal, far).sqrt();

        let hinge = dist.neg().add_scalar(self.repulse_extent).clamp_min(0.0);
        (hinge.clone() * hinge)
            .sum_dim(2)
            .sum_dim(1)
            .reshape([n])
            .mean()
            .div_scalar(k as f32)
    }

    /// Weighted sum of both terms over every trace.
    ///
    /// Output: scalar loss, zero when there are no traces
    pub fn forward<B: Backend>(
        &self,
        traces: &[DeformationTrace<B>],
        device: &B::Device,
    ) -> Tensor<B, 1> {
        traces.iter().fold(Tensor::zeros([1], device), |total, trace| {
            total
                + self.fitting(trace).mul_scalar(self.fitting_weight)
                + self.repulsive(trace).mul_scalar(self.repulsive_weight)
        })
    }
}
