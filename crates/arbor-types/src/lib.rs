//! Foundation types for Arbor.
//!
//! This crate provides the vocabulary shared by every other Arbor crate:
//! comparison roles, feature declarations, attribute values, match keys,
//! arena identifiers, operation statuses, and the cooperative progress
//! contract.
//!
//! # Key Types
//!
//! - [`Role`] / [`RoleMap`] -- TARGET, REFERENCE, ANCESTOR and per-role storage
//! - [`Feature`] / [`FeatureKind`] -- attribute and reference declarations
//! - [`AttributeValue`] -- primitive attribute values
//! - [`MatchKey`] -- identifier produced by a match policy
//! - [`MatchId`] / [`DifferenceId`] -- arena indices
//! - [`Status`] -- result of long-running operations
//! - [`ProgressMonitor`] -- progress reporting and cancellation

pub mod error;
pub mod feature;
pub mod ids;
pub mod progress;
pub mod role;
pub mod status;

pub use error::{PolicyError, TypeError};
pub use feature::{AttributeValue, Feature, FeatureKind, MatchKey};
pub use ids::{DifferenceId, MatchId};
pub use progress::{
    CancellationToken, NullProgress, Progress, ProgressCallback, ProgressMonitor, ProgressTracker,
};
pub use role::{Role, RoleMap};
pub use status::Status;
