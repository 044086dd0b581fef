//! Error types for kp_nn.

use thiserror::Error;

/// Errors that can occur while building or running point convolutions.
#[derive(Error, Debug)]
pub enum KpError {
    /// Error from the pure-math layer (unknown option names, layout requests, bad indices).
    #[error(transparent)]
    Core(#[from] kp_core::KpCoreError),

    /// Block name not recognized by the block factory.
    #[error("unknown block name in the architecture definition: '{name}'")]
    UnknownBlock {
        /// The rejected name.
        name: String,
    },

    /// Convolution method name not recognized.
    #[error("unknown convolution method '{name}' (expected kpconv, triplane_direct, triplane_scored or triplane_depthwise)")]
    UnknownConvMethod {
        /// The rejected name.
        name: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A neighbor index points past the shadow sentinel.
    #[error("neighbor index {index} out of bounds for padded support set of {table_size} rows")]
    NeighborIndexOutOfBounds {
        /// The offending index.
        index: i64,
        /// Number of rows in the padded support set (real points + shadow).
        table_size: usize,
    },

    /// The neighbor table was built for a different support set.
    #[error("neighbor table addresses {table} support points but {given} were given")]
    SupportMismatch {
        /// Support size the table was validated against.
        table: usize,
        /// Support size passed to the operator.
        given: usize,
    },

    /// The neighbor table has a different number of rows than there are query points.
    #[error("neighbor table has {rows} rows for {queries} query points")]
    QueryMismatch {
        /// Rows in the table.
        rows: usize,
        /// Number of query points.
        queries: usize,
    },

    /// Neighborhood wider than the generative kernel-point input.
    #[error("neighborhood width {width} exceeds the kernel generator input of {max} neighbors")]
    NeighborWidthExceeded {
        /// Width of the neighbor table.
        width: usize,
        /// Maximum width accepted by the generator.
        max: usize,
    },

    /// Segment lengths do not partition the feature rows.
    #[error("segment lengths sum to {total} but there are {rows} feature rows")]
    SegmentMismatch {
        /// Sum of the segment lengths.
        total: usize,
        /// Number of feature rows.
        rows: usize,
    },

    /// Empty segment in a global average.
    #[error("segment {segment} is empty")]
    EmptySegment {
        /// Segment position.
        segment: usize,
    },

    /// The geometry batch has no entry for the requested level.
    #[error("geometry batch has no {what} for level {level}")]
    MissingLevel {
        /// Hierarchy level.
        level: usize,
        /// Which table was requested.
        what: &'static str,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Invalid or corrupted tensor data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl KpError {
    /// Shorthand for [`KpError::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        KpError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for kp_nn operations.
pub type Result<T> = std::result::Result<T, KpError>;
