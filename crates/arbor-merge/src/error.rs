//! Error types for the merge engine.
//!
//! These abort a whole merge call. Failures of a single difference are not
//! errors: they are reported as [`BlockReason`](crate::BlockReason)s.

use arbor_types::{DifferenceId, PolicyError, Role};

/// Errors that prevent a merge from starting.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Only TARGET and REFERENCE can receive merges.
    #[error("cannot merge into {0}")]
    InvalidDestination(Role),

    /// The destination scope rejects mutations.
    #[error("destination scope '{0}' is read-only")]
    ReadOnlyScope(String),

    /// A selected difference does not exist.
    #[error("unknown difference: {0}")]
    UnknownDifference(DifferenceId),

    /// The merge policy failed while ordering differences.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
