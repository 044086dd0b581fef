//! Bilinear taps on a square grid with aligned corners.
//!
//! Unit coordinates `(u, v)` in `[0, 1]` map to pixel positions
//! `u * (res - 1)`, so `0` and `1` land exactly on the first and last grid
//! nodes. `u` selects the column and `v` the row. Positions outside the grid
//! are clamped to the border.

/// Epsilon keeping the lower corner strictly below the last node.
pub const CLAMP_EPSILON: f32 = 1e-5;

/// The four grid nodes surrounding a sample and their weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearTaps {
    /// `(row, col)` of the four nodes: `(r0,c0)`, `(r0,c1)`, `(r1,c0)`, `(r1,c1)`.
    pub nodes: [(usize, usize); 4],
    /// Weights matching `nodes`, summing to 1.
    pub weights: [f32; 4],
}

impl BilinearTaps {
    /// Flat row-major node indices for a grid of side `res`.
    #[inline]
    pub fn flat_indices(&self, res: usize) -> [usize; 4] {
        self.nodes.map(|(r, c)| r * res + c)
    }
}

/// Compute the bilinear taps for unit coordinates `(u, v)`.
///
/// `res` must be at least 2.
pub fn aligned_taps(u: f32, v: f32, res: usize) -> BilinearTaps {
    debug_assert!(res >= 2, "bilinear sampling needs at least a 2x2 grid");

    let last = (res - 1) as f32;
    let (c0, c1, x) = axis_taps(u * last, last);
    let (r0, r1, y) = axis_taps(v * last, last);

    let (fc0, fc1) = (c0 as f32, c1 as f32);
    let (fr0, fr1) = (r0 as f32, r1 as f32);

    BilinearTaps {
        nodes: [(r0, c0), (r0, c1), (r1, c0), (r1, c1)],
        weights: [
            (fc1 - x) * (fr1 - y),
            (x - fc0) * (fr1 - y),
            (fc1 - x) * (y - fr0),
            (x - fc0) * (y - fr0),
        ],
    }
}

/// Lower node, upper node and border-clamped position along one axis.
#[inline]
fn axis_taps(pos: f32, last: f32) -> (usize, usize, f32) {
    // The epsilon is below f32 resolution on grids wider than 256 nodes
    let lower = (libm::floorf(pos.clamp(0.0, last - CLAMP_EPSILON)) as usize).min(last as usize - 1);
    let upper = lower + 1;
    (lower, upper, pos.clamp(0.0, last))
}

/// Sample one channel of a row-major `res x res` grid.
pub fn sample_grid(values: &[f32], res: usize, u: f32, v: f32) -> f32 {
    let taps = aligned_taps(u, v, res);
    taps.flat_indices(res)
        .iter()
        .zip(taps.weights.iter())
        .map(|(&i, &w)| values[i] * w)
        .sum()
}
