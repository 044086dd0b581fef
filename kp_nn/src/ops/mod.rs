//! Neighbor-table utilities: validated tables, shadow-padded gathers and pooling.
//!
//! Every support set is padded with one extra row before gathering: a far
//! point (`1e6` on every axis) for coordinates and a zero row for features.
//! Neighbor tables use the index `support_len` for that row.

mod gather;
mod pool;
mod table;

pub use gather::{
    gather_padded, gather_rows, gather_rows_2d, gather_rows_nd, pad_features, pad_points,
    pad_row, relative_neighbors,
};
pub use pool::{closest_pool, global_average, max_pool};
pub use table::NeighborTable;
