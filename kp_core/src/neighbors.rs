//! Host-side neighbor tables.
//!
//! A neighbor table has one fixed-width row per query point. Rows with fewer
//! real neighbors than the width are padded with shadow slots. On the host a
//! shadow slot is `None`; in flat index form it is the sentinel index
//! `support_len`, one past the last real support point.

use alloc::vec::Vec;

use crate::error::KpCoreError;

/// Fixed-width neighbor table with explicit shadow slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborRows {
    support_len: usize,
    width: usize,
    slots: Vec<Option<usize>>,
}

impl NeighborRows {
    /// Build a table from ragged rows.
    ///
    /// Rows shorter than `width` are padded with shadow slots.
    pub fn from_rows(
        support_len: usize,
        width: usize,
        rows: &[Vec<Option<usize>>],
    ) -> Result<Self, KpCoreError> {
        let mut slots = Vec::with_capacity(rows.len() * width);

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() > width {
                return Err(KpCoreError::RowTooWide {
                    row: row_idx,
                    len: row.len(),
                    width,
                });
            }
            for slot in row {
                if let Some(idx) = *slot {
                    if idx >= support_len {
                        return Err(KpCoreError::NeighborIndexOutOfBounds {
                            index: idx as i64,
                            table_size: support_len + 1,
                        });
                    }
                }
                slots.push(*slot);
            }
            slots.extend(core::iter::repeat(None).take(width - row.len()));
        }

        Ok(Self {
            support_len,
            width,
            slots,
        })
    }

    /// Build a table from flat sentinel-encoded indices.
    pub fn from_indices(
        indices: &[i64],
        width: usize,
        support_len: usize,
    ) -> Result<Self, KpCoreError> {
        validate_indices(indices, support_len)?;

        let slots = indices
            .iter()
            .map(|&i| {
                if i as usize == support_len {
                    None
                } else {
                    Some(i as usize)
                }
            })
            .collect();

        Ok(Self {
            support_len,
            width,
            slots,
        })
    }

    /// Number of real support points.
    #[inline]
    pub fn support_len(&self) -> usize {
        self.support_len
    }

    /// Sentinel index used for shadow slots.
    #[inline]
    pub fn sentinel(&self) -> usize {
        self.support_len
    }

    /// Number of slots per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows (query points).
    #[inline]
    pub fn num_rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.slots.len() / self.width
        }
    }

    /// Slot at `(row, col)`; `None` for a shadow neighbor.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<usize> {
        self.slots[row * self.width + col]
    }

    /// Number of real (non-shadow) neighbors in a row.
    pub fn real_count(&self, row: usize) -> usize {
        self.slots[row * self.width..(row + 1) * self.width]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Flat row-major indices with shadow slots mapped to the sentinel.
    pub fn to_indices(&self) -> Vec<i64> {
        let sentinel = self.sentinel() as i64;
        self.slots
            .iter()
            .map(|s| s.map_or(sentinel, |i| i as i64))
            .collect()
    }
}

/// Check that every index addresses a real support point or the sentinel.
///
/// The padded support set has `support_len + 1` rows; anything outside
/// `[0, support_len]` is a defect in the upstream neighbor search.
pub fn validate_indices(indices: &[i64], support_len: usize) -> Result<(), KpCoreError> {
    let table_size = support_len + 1;
    match indices
        .iter()
        .find(|&&i| i < 0 || i as usize >= table_size)
    {
        Some(&index) => Err(KpCoreError::NeighborIndexOutOfBounds { index, table_size }),
        None => Ok(()),
    }
}

/// Neighbor table re-packed to keep only in-range neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repacked {
    /// New table width: the largest in-range count over all rows (at least 1).
    pub width: usize,
    /// Re-packed indices `[rows * width]`; discarded slots hold the sentinel.
    pub indices: Vec<i64>,
    /// Source column of every new slot `[rows * width]`.
    pub columns: Vec<i64>,
}

/// Re-pack a neighbor table after in-range filtering.
///
/// Each row keeps its in-range neighbors first, in their original order,
/// followed by the remaining columns. The table is truncated to the largest
/// in-range count and every slot that was not in range is remapped to the
/// sentinel.
///
/// # Arguments
/// * `indices` - Row-major neighbor indices `[rows * width]`
/// * `in_range` - Row-major mask `[rows * width]`
/// * `rows` - Number of query points
/// * `width` - Current table width
/// * `sentinel` - Shadow index
pub fn repack_in_range(
    indices: &[i64],
    in_range: &[bool],
    rows: usize,
    width: usize,
    sentinel: usize,
) -> Repacked {
    let max_in_range = (0..rows)
        .map(|r| in_range[r * width..(r + 1) * width].iter().filter(|&&b| b).count())
        .max()
        .unwrap_or(0);
    let new_width = max_in_range.max(1).min(width.max(1));

    let mut new_indices = Vec::with_capacity(rows * new_width);
    let mut columns = Vec::with_capacity(rows * new_width);

    for r in 0..rows {
        let mask = &in_range[r * width..(r + 1) * width];
        let kept = (0..width).filter(|&c| mask[c]);
        let dropped = (0..width).filter(|&c| !mask[c]);

        for c in kept.chain(dropped).take(new_width) {
            columns.push(c as i64);
            if mask[c] {
                new_indices.push(indices[r * width + c]);
            } else {
                new_indices.push(sentinel as i64);
            }
        }
    }

    Repacked {
        width: new_width,
        indices: new_indices,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_from_rows_pads_with_shadow() {
        let rows = NeighborRows::from_rows(5, 3, &[vec![Some(1)], vec![Some(2), Some(4)]]).unwrap();

        assert_eq!(rows.num_rows(), 2);
        assert_eq!(rows.get(0, 0), Some(1));
        assert_eq!(rows.get(0, 1), None);
        assert_eq!(rows.real_count(1), 2);
        assert_eq!(rows.to_indices(), vec![1, 5, 5, 2, 4, 5]);
    }

    #[test]
    fn test_from_rows_rejects_bad_input() {
        assert!(matches!(
            NeighborRows::from_rows(3, 2, &[vec![Some(0), Some(1), Some(2)]]),
            Err(KpCoreError::RowTooWide { row: 0, len: 3, width: 2 })
        ));
        assert!(matches!(
            NeighborRows::from_rows(3, 2, &[vec![Some(3)]]),
            Err(KpCoreError::NeighborIndexOutOfBounds {
                index: 3,
                table_size: 4
            })
        ));
    }

    #[test]
    fn test_validate_indices() {
        assert!(validate_indices(&[0, 1, 2, 3], 3).is_ok());
        assert_eq!(
            validate_indices(&[0, 4, 1], 3),
            Err(KpCoreError::NeighborIndexOutOfBounds {
                index: 4,
                table_size: 4
            })
        );
        assert!(validate_indices(&[-1], 3).is_err());
    }

    #[test]
    fn test_from_indices_round_trip() {
        let indices = vec![0, 3, 2, 3];
        let rows = NeighborRows::from_indices(&indices, 2, 3).unwrap();
        assert_eq!(rows.get(0, 1), None);
        assert_eq!(rows.to_indices(), indices);
    }

    #[test]
    fn test_repack_keeps_in_range_first() {
        // Row 0: columns 1 and 3 in range; row 1: only column 2
        let indices = vec![10, 11, 12, 13, 20, 21, 22, 23];
        let mask = vec![false, true, false, true, false, false, true, false];

        let repacked = repack_in_range(&indices, &mask, 2, 4, 99);

        assert_eq!(repacked.width, 2);
        assert_eq!(repacked.indices, vec![11, 13, 22, 99]);
        assert_eq!(repacked.columns, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_repack_nothing_in_range() {
        let indices = vec![0, 1, 2, 3];
        let mask = vec![false; 4];

        let repacked = repack_in_range(&indices, &mask, 2, 2, 7);

        assert_eq!(repacked.width, 1);
        assert_eq!(repacked.indices, vec![7, 7]);
    }
}
