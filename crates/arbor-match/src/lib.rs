//! Matching engine for Arbor.
//!
//! Pairs elements of the compared scopes into [`Match`] records using a
//! pluggable [`MatchPolicy`], and keeps them in a [`Mapping`] arena that
//! later stages (differencing, merging) refer to by [`MatchId`].
//!
//! # Key Types
//!
//! - [`Match`] -- one logical element across TARGET, REFERENCE, ANCESTOR
//! - [`Mapping`] -- indexed collection of matches, completed matches, duplicates
//! - [`MatchPolicy`] -- element to key; built-ins: [`PathMatchPolicy`],
//!   [`AttributeMatchPolicy`], [`IdentityMatchPolicy`], [`FnMatchPolicy`]
//! - [`build_mapping`] -- the two-pass matching algorithm
//!
//! [`MatchId`]: arbor_types::MatchId

pub mod engine;
pub mod entry;
pub mod error;
pub mod mapping;
pub mod policy;

pub use engine::{build_mapping, ScopeSet};
pub use entry::Match;
pub use error::{MatchError, MatchResult};
pub use mapping::Mapping;
pub use policy::{
    AttributeMatchPolicy, FnMatchPolicy, IdentityMatchPolicy, MatchPolicy, PathMatchPolicy,
};
