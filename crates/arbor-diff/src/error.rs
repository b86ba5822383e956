//! Error types for difference computation.

use arbor_types::{PolicyError, Role};

/// Errors that abort a difference computation.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The diff or match policy failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A side scope was not supplied.
    #[error("no scope supplied for role {0}")]
    MissingScope(Role),

    /// The progress monitor requested cancellation.
    #[error("difference computation cancelled")]
    Cancelled,
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
