//! Error types for the matching engine.

use arbor_types::{PolicyError, Role};

/// Errors that abort a matching run.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The match policy failed on an element.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A scope required for matching was not supplied.
    #[error("no scope supplied for role {0}")]
    MissingScope(Role),

    /// The progress monitor requested cancellation.
    #[error("matching cancelled")]
    Cancelled,
}

/// Convenience alias for matching results.
pub type MatchResult<T> = Result<T, MatchError>;
