use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a long-running operation such as `compute()`.
///
/// Unlike an error, a `Status` is always returned: callers inspect it to
/// decide whether the result can be trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The operation completed normally.
    Ok,
    /// The operation completed but its result is degraded.
    Warning(String),
    /// The operation was aborted; state was left as before the call.
    Error(String),
    /// The operation was cancelled through its progress monitor.
    Cancelled,
}

impl Status {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Returns `true` for `Ok` only.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns `true` if results are available (`Ok` or `Warning`).
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ok | Self::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Human-readable message; empty for `Ok`.
    pub fn message(&self) -> &str {
        match self {
            Self::Ok => "",
            Self::Warning(m) | Self::Error(m) => m,
            Self::Cancelled => "operation cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning(m) => write!(f, "WARNING: {m}"),
            Self::Error(m) => write!(f, "ERROR: {m}"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}
