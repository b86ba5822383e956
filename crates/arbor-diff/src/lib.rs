//! Difference engine for Arbor.
//!
//! Walks a [`Mapping`](arbor_match::Mapping) and records every structural
//! discrepancy between TARGET and REFERENCE as a typed [`Difference`].
//!
//! # Key Types
//!
//! - [`Difference`] / [`DifferenceKind`] -- element, attribute-value and
//!   reference-value presences (order-only differences are flagged)
//! - [`DifferenceSet`] -- arena of differences with the live subset
//! - [`DiffPolicy`] -- feature coverage, order sensitivity, ignored references
//! - [`compute_differences`] -- the difference computation

pub mod difference;
pub mod engine;
pub mod error;
pub mod policy;
pub mod set;

pub use difference::{Difference, DifferenceCategory, DifferenceKind};
pub use engine::{compute_differences, DiffOptions, DiffPolicies};
pub use error::{DiffError, DiffResult};
pub use policy::{DefaultDiffPolicy, DiffPolicy, FeatureFilterDiffPolicy};
pub use set::{DiffSummary, DifferenceSet};
