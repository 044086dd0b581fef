//! Parameter-free blocks moving features between levels.

use burn::module::Module;
use burn::prelude::*;

use crate::batch::GeometryBatch;
use crate::error::Result;
use crate::ops::{closest_pool, global_average, max_pool};

/// Max over the pooling neighbors into the next level.
#[derive(Module, Clone, Debug)]
pub struct MaxPoolBlock {
    #[module(skip)]
    layer: usize,
}

impl MaxPoolBlock {
    /// Create a max-pool block for a level.
    pub fn new(layer: usize) -> Self {
        Self { layer }
    }

    /// Forward pass.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 2>, batch: &GeometryBatch<B>) -> Result<Tensor<B, 2>> {
        max_pool(x, batch.pools(self.layer + 1)?)
    }
}

/// Copy the features of the nearest coarse point.
#[derive(Module, Clone, Debug)]
pub struct NearestUpsampleBlock {
    #[module(skip)]
    layer: usize,
}

impl NearestUpsampleBlock {
    /// Create an upsampling block reading `upsamples[layer - 1]`.
    pub fn new(layer: usize) -> Self {
        Self { layer }
    }

    /// Forward pass.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 2>, batch: &GeometryBatch<B>) -> Result<Tensor<B, 2>> {
        let source = self.layer.saturating_sub(1);
        closest_pool(x, batch.upsamples(source)?)
    }
}

/// Mean of every cloud of the coarsest level.
#[derive(Module, Clone, Debug)]
pub struct GlobalAverageBlock;

impl GlobalAverageBlock {
    /// Forward pass.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 2>, batch: &GeometryBatch<B>) -> Result<Tensor<B, 2>> {
        global_average(x, batch.last_lengths()?)
    }
}
