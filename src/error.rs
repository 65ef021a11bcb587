//! SurfaceSieveError: Unified error type for surface-sieve public APIs
//!
//! This error type is used throughout the surface-sieve library to provide
//! robust, non-panicking error handling for all public APIs.

use thiserror::Error;

/// Unified error type for surface-sieve operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceSieveError {
    /// An attribute array's length does not match the element count it is
    /// attached to. Detected by the pre-check pass before traversal.
    #[error("attribute `{name}` has {actual} tuples, expected {expected}")]
    MalformedAttributes {
        /// Name of the offending array.
        name: String,
        /// Element count of the owning dataset.
        expected: usize,
        /// Actual tuple count of the array.
        actual: usize,
    },
    /// A dataset kind this library cannot extract geometry from was handed
    /// in as the sole (non-composite) input. Inside a composite tree the
    /// same condition is a warn-and-skip, not an error.
    #[error("unsupported dataset kind `{0}` as non-composite input")]
    UnsupportedDataSet(&'static str),
    /// An id-remapping chain referenced an original-point-id array that a
    /// previous stage should have produced but did not.
    #[error("missing original point id arrays during wireframe id reconciliation")]
    MissingOriginalPointIds,
    /// A collective operation reported failure on this rank.
    #[error("communicator reduce failed: {0}")]
    ReduceFailed(String),
    /// A cell references a point outside the dataset's point range.
    #[error("cell {cell} references point {point}, but dataset has {npoints} points")]
    PointIndexOutOfRange {
        /// Offending cell index.
        cell: usize,
        /// Referenced point index.
        point: usize,
        /// Number of points in the dataset.
        npoints: usize,
    },
}
