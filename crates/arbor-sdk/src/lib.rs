//! High-level SDK for Arbor.
//!
//! Provides [`Comparison`], the entry point tying matching, differencing
//! and merging together over caller-supplied scopes.
//!
//! ```no_run
//! use arbor_sdk::{Comparison, MemoryScope, NullProgress, Role, Schema};
//!
//! let target = MemoryScope::new("target", Schema::new());
//! let reference = MemoryScope::new("reference", Schema::new());
//! let mut comparison = Comparison::new(target, reference);
//! let status = comparison.compute(None, None, None, &NullProgress);
//! assert!(status.is_usable());
//! comparison.merge_all(Role::Target, true, &NullProgress).unwrap();
//! ```

pub mod comparison;
pub mod config;
pub mod error;

pub use comparison::{Comparison, ComparisonId};
pub use config::ComparisonConfig;
pub use error::{ComparisonError, ComparisonResult};

// Re-export key types
pub use arbor_diff::{
    DefaultDiffPolicy, DiffPolicy, DiffSummary, Difference, DifferenceCategory, DifferenceKind,
    FeatureFilterDiffPolicy,
};
pub use arbor_match::{
    AttributeMatchPolicy, FnMatchPolicy, IdentityMatchPolicy, Mapping, Match, MatchPolicy,
    PathMatchPolicy,
};
pub use arbor_merge::{
    BlockReason, DefaultMergePolicy, FnMergeSelector, MergePolicy, MergeReport, MergeSelector,
    PreferRoleMergePolicy, RoleMergeSelector,
};
pub use arbor_scope::{EditableTreeDataScope, ElementId, MemoryScope, Schema, TreeDataScope};
pub use arbor_types::{
    AttributeValue, CancellationToken, DifferenceId, Feature, MatchId, MatchKey, NullProgress,
    PolicyError, ProgressMonitor, ProgressTracker, Role, Status,
};
