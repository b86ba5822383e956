use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("unsupported attribute value: {0}")]
    UnsupportedValue(String),
}

/// Failure raised by a match, diff, or merge policy.
///
/// Aborts the operation that invoked the policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("policy '{policy}' failed: {message}")]
pub struct PolicyError {
    /// Name of the failing policy.
    pub policy: String,
    /// What went wrong.
    pub message: String,
}

impl PolicyError {
    pub fn new(policy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            message: message.into(),
        }
    }
}
