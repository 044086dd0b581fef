//! Multi-level geometry consumed by the blocks.
//!
//! A batch is produced by an external neighbor search. Level `l` holds the
//! points of the `l`-th subsampling, their neighbor table, the pooling table
//! from level `l` to `l + 1` and the upsampling table from level `l + 1` back
//! to level `l`.

use burn::prelude::*;

use crate::error::{KpError, Result};
use crate::ops::NeighborTable;

/// Per-level point sets and neighbor tables of one batch.
#[derive(Debug, Clone)]
pub struct GeometryBatch<B: Backend> {
    /// Points `[n_l, 3]` per level.
    pub points: Vec<Tensor<B, 2>>,
    /// Neighbors of level `l` within level `l`.
    pub neighbors: Vec<NeighborTable<B>>,
    /// Neighbors of level `l + 1` points within level `l`.
    pub pools: Vec<NeighborTable<B>>,
    /// Neighbors of level `l` points within level `l + 1`.
    pub upsamples: Vec<NeighborTable<B>>,
    /// Neighborhood radius per level.
    pub neighbor_radius: Vec<f32>,
    /// Points per cloud, per level.
    pub lengths: Vec<Vec<usize>>,
}

/// Geometry one convolution needs.
#[derive(Debug, Clone)]
pub struct LayerGeometry<'a, B: Backend> {
    /// Output points `[n, 3]`.
    pub query: Tensor<B, 2>,
    /// Input points `[n_s, 3]`.
    pub support: Tensor<B, 2>,
    /// Neighbors of `query` within `support`.
    pub neighbors: &'a NeighborTable<B>,
    /// Neighborhood radius of the input level.
    pub radius: f32,
}

fn level<'a, T>(items: &'a [T], level: usize, what: &'static str) -> Result<&'a T> {
    items.get(level).ok_or(KpError::MissingLevel { level, what })
}

impl<B: Backend> GeometryBatch<B> {
    /// Number of point levels.
    pub fn num_levels(&self) -> usize {
        self.points.len()
    }

    /// Points of a level.
    pub fn points(&self, l: usize) -> Result<Tensor<B, 2>> {
        level(&self.points, l, "points").cloned()
    }

    /// Neighbor table of a level.
    pub fn neighbors(&self, l: usize) -> Result<&NeighborTable<B>> {
        level(&self.neighbors, l, "neighbors")
    }

    /// Pooling table from level `l` to `l + 1`.
    pub fn pools(&self, l: usize) -> Result<&NeighborTable<B>> {
        level(&self.pools, l, "pools")
    }

    /// Upsampling table from level `l + 1` to `l`.
    pub fn upsamples(&self, l: usize) -> Result<&NeighborTable<B>> {
        level(&self.upsamples, l, "upsamples")
    }

    /// Neighborhood radius of a level.
    pub fn radius(&self, l: usize) -> Result<f32> {
        level(&self.neighbor_radius, l, "neighbor radius").copied()
    }

    /// Cloud lengths of a level.
    pub fn lengths(&self, l: usize) -> Result<&[usize]> {
        level(&self.lengths, l, "lengths").map(Vec::as_slice)
    }

    /// Cloud lengths of the coarsest level.
    pub fn last_lengths(&self) -> Result<&[usize]> {
        match self.lengths.len() {
            0 => Err(KpError::MissingLevel {
                level: 0,
                what: "lengths",
            }),
            n => self.lengths(n - 1),
        }
    }

    /// Geometry of a convolution at level `l`.
    ///
    /// Strided convolutions read level `l` and write level `l + 1` through
    /// the pooling table.
    pub fn layer(&self, l: usize, strided: bool) -> Result<LayerGeometry<'_, B>> {
        let support = self.points(l)?;
        let radius = self.radius(l)?;
        if strided {
            Ok(LayerGeometry {
                query: self.points(l + 1)?,
                support,
                neighbors: self.pools(l)?,
                radius,
            })
        } else {
            Ok(LayerGeometry {
                query: support.clone(),
                support,
                neighbors: self.neighbors(l)?,
                radius,
            })
        }
    }
}
