//! Outcome of a merge call.

use serde::{Deserialize, Serialize};

use arbor_scope::ScopeError;
use arbor_types::{DifferenceId, MatchId, Role};

/// Why a selected difference could not be merged.
///
/// A blocked difference stays live and can be retried, typically after
/// merging the differences it depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum BlockReason {
    /// The container of an element to add has no counterpart in the
    /// destination.
    #[error("container {0} is missing in the destination")]
    MissingContainer(MatchId),

    /// A match lacks the element the difference needs.
    #[error("match {match_id} has no element in {role}")]
    MissingElement { match_id: MatchId, role: Role },

    /// A reference target is absent from the destination and cannot be
    /// materialized.
    #[error("reference target {0} is missing in the destination")]
    MissingReferenceTarget(MatchId),

    /// A reference target in the source has no match.
    #[error("reference target has no match")]
    UnmappedReference,

    /// Materializing reference targets exceeded the configured depth.
    #[error("dependency depth {0} exceeded")]
    DependencyTooDeep(usize),

    /// A descendant of an element to remove is kept by the source but
    /// cannot be moved out first.
    #[error("kept descendant {0} cannot be moved out of the removed subtree")]
    DisplacedDescendant(MatchId),

    /// Incoming references could not be cleared before removal.
    #[error("disconnection failed: {0}")]
    Disconnection(String),

    /// The destination scope rejected an edit.
    #[error("scope rejected edit: {0}")]
    Scope(String),
}

impl From<ScopeError> for BlockReason {
    fn from(err: ScopeError) -> Self {
        Self::Scope(err.to_string())
    }
}

/// A selected difference that was not merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDifference {
    pub id: DifferenceId,
    pub reason: BlockReason,
}

/// What a merge call did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// The role that received the changes.
    pub destination: Role,
    /// Differences applied, in application order. Includes element
    /// presences materialized to satisfy references.
    pub merged: Vec<DifferenceId>,
    /// Differences retired as a side effect: symmetric counterparts and
    /// differences made moot by a removal.
    pub retired: Vec<DifferenceId>,
    /// Selected differences left live.
    pub blocked: Vec<BlockedDifference>,
    /// The monitor cancelled the merge before every difference was tried.
    pub cancelled: bool,
}

impl MergeReport {
    pub fn new(destination: Role) -> Self {
        Self {
            destination,
            merged: Vec::new(),
            retired: Vec::new(),
            blocked: Vec::new(),
            cancelled: false,
        }
    }

    /// Every selected difference was merged.
    pub fn is_complete(&self) -> bool {
        self.blocked.is_empty() && !self.cancelled
    }

    pub fn is_blocked(&self, id: DifferenceId) -> bool {
        self.blocked.iter().any(|b| b.id == id)
    }
}
