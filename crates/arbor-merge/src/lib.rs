//! Merge engine for Arbor.
//!
//! Applies selected differences to the TARGET or REFERENCE scope of a
//! comparison, respecting containment and reference dependencies.
//!
//! # Key Types
//!
//! - [`Merger`] -- one merge call into one destination role
//! - [`MergeOptions`] -- reference materialization and its depth bound
//! - [`MergePolicy`] -- merge order and conflict resolution; built-ins:
//!   [`DefaultMergePolicy`], [`PreferRoleMergePolicy`]
//! - [`MergeSelector`] -- predicate choosing differences to merge; built-ins:
//!   [`RoleMergeSelector`], [`FnMergeSelector`]
//! - [`MergeReport`] -- merged, retired and blocked differences
//!
//! # Failure model
//!
//! A difference that cannot be applied (missing container, unresolvable
//! reference, rejected edit) is reported in [`MergeReport::blocked`] and
//! stays live. Only precondition violations abort the call with a
//! [`MergeError`].

pub mod engine;
pub mod error;
pub mod policy;
pub mod report;

pub use engine::{MergeOptions, Merger};
pub use error::{MergeError, MergeResult};
pub use policy::{
    containment_order, depth_of, DefaultMergePolicy, FnMergeSelector, MergePolicy, MergeSelector,
    PreferRoleMergePolicy, RoleMergeSelector,
};
pub use report::{BlockReason, BlockedDifference, MergeReport};
