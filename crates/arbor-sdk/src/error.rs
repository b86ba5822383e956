use thiserror::Error;

use arbor_diff::DiffError;
use arbor_match::MatchError;
use arbor_merge::MergeError;

/// Errors surfaced by [`Comparison`](crate::Comparison) operations other
/// than `compute()`, which reports through a `Status`.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("comparison has not been computed")]
    NotComputed,

    #[error("comparison is inconsistent: duplicate match keys in {0}")]
    Inconsistent(String),

    #[error("matching failed: {0}")]
    Match(#[from] MatchError),

    #[error("differencing failed: {0}")]
    Diff(#[from] DiffError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type ComparisonResult<T> = Result<T, ComparisonError>;
