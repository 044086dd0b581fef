//! Error types for kp_core operations.
//!
//! Hand-written `Display` keeps the crate free of dependencies in `no_std` builds.

use alloc::string::String;
use core::fmt;

/// Error types that can occur during kp_core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum KpCoreError {
    /// Influence function name not recognized.
    UnknownInfluence {
        /// The rejected name.
        name: String,
    },
    /// Aggregation mode name not recognized.
    UnknownAggregation {
        /// The rejected name.
        name: String,
    },
    /// Fixed kernel-point policy name not recognized.
    UnknownFixedPoints {
        /// The rejected name.
        name: String,
    },
    /// Kernel layouts are only defined for 3-D points.
    UnsupportedDimension {
        /// The requested dimension.
        dimension: usize,
    },
    /// The kernel-point count cannot satisfy the fixed-point policy.
    InvalidKernelCount {
        /// The requested count.
        count: usize,
        /// The minimum count for the policy.
        min: usize,
    },
    /// A neighbor index points past the shadow sentinel.
    NeighborIndexOutOfBounds {
        /// The offending index.
        index: i64,
        /// Number of rows in the padded support set (real points + shadow).
        table_size: usize,
    },
    /// A neighbor row is wider than the table.
    RowTooWide {
        /// Row position in the table.
        row: usize,
        /// Number of entries in that row.
        len: usize,
        /// Table width.
        width: usize,
    },
}

impl fmt::Display for KpCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpCoreError::UnknownInfluence { name } => {
                write!(
                    f,
                    "unknown influence function '{}' (expected constant, linear or gaussian)",
                    name
                )
            }
            KpCoreError::UnknownAggregation { name } => {
                write!(
                    f,
                    "unknown aggregation mode '{}' (expected sum or closest)",
                    name
                )
            }
            KpCoreError::UnknownFixedPoints { name } => {
                write!(
                    f,
                    "unknown fixed kernel points policy '{}' (expected none, center or verticals)",
                    name
                )
            }
            KpCoreError::UnsupportedDimension { dimension } => {
                write!(f, "kernel layouts require dimension 3, got {}", dimension)
            }
            KpCoreError::InvalidKernelCount { count, min } => {
                write!(f, "kernel point count {} is below the minimum {}", count, min)
            }
            KpCoreError::NeighborIndexOutOfBounds { index, table_size } => {
                write!(
                    f,
                    "neighbor index {} out of bounds for padded support set of {} rows",
                    index, table_size
                )
            }
            KpCoreError::RowTooWide { row, len, width } => {
                write!(
                    f,
                    "neighbor row {} has {} entries but the table width is {}",
                    row, len, width
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KpCoreError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[cfg(feature = "std")]
    #[test]
    fn test_error_display() {
        use std::format;

        let err = KpCoreError::UnknownInfluence {
            name: "cubic".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "unknown influence function 'cubic' (expected constant, linear or gaussian)"
        );

        let err = KpCoreError::NeighborIndexOutOfBounds {
            index: 12,
            table_size: 11,
        };
        assert_eq!(
            format!("{}", err),
            "neighbor index 12 out of bounds for padded support set of 11 rows"
        );

        let err = KpCoreError::InvalidKernelCount { count: 2, min: 3 };
        assert_eq!(format!("{}", err), "kernel point count 2 is below the minimum 3");
    }

    #[test]
    fn test_error_equality() {
        let err1 = KpCoreError::UnsupportedDimension { dimension: 2 };
        let err2 = KpCoreError::UnsupportedDimension { dimension: 2 };
        let err3 = KpCoreError::UnsupportedDimension { dimension: 4 };

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
