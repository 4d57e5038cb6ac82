use thiserror::Error;

/// Failures raised while constructing or driving a clusterer.
///
/// Numerical trouble during iteration (ill-conditioned covariances, density
/// underflow, clusters losing all members) is absorbed by the engine and never
/// shows up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The seed search gave up before finding enough value-distinct points.
    #[error("Found only {found} distinct seed points for {requested} clusters after {draws} draws")]
    InsufficientDistinctPoints {
        requested: usize,
        found: usize,
        draws: usize,
    },

    #[error("Point source exhausted after {found} distinct seed points, {requested} clusters requested")]
    SourceExhausted { requested: usize, found: usize },

    #[error("Clusterer must be initialized with seed points first")]
    NotInitialized,

    #[error("No iteration started, call start_iteration first")]
    NoIterationStarted,
}
