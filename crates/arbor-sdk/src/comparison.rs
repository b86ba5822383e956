//! The comparison orchestrator.
//!
//! A [`Comparison`] owns the compared scopes and, once computed, the
//! mapping and difference set derived from them. It moves through
//!
//! ```text
//! EMPTY --compute--> COMPUTED --merge--> COMPUTED (fewer differences)
//!   ^                   |
//!   +------clear--------+
//! ```
//!
//! A failed or cancelled `compute()` leaves the previous state in place.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use arbor_diff::{
    compute_differences, DefaultDiffPolicy, DiffError, DiffPolicies, DiffPolicy, DiffSummary,
    Difference, DifferenceSet,
};
use arbor_match::{build_mapping, Mapping, MatchError, MatchPolicy, PathMatchPolicy, ScopeSet};
use arbor_merge::{
    DefaultMergePolicy, MergeError, MergePolicy, MergeReport, MergeSelector, Merger,
};
use arbor_scope::{EditableTreeDataScope, ScopeElement, TreeDataScope};
use arbor_types::{DifferenceId, MatchId, MatchKey, ProgressMonitor, Role, RoleMap, Status};

use crate::config::ComparisonConfig;
use crate::error::{ComparisonError, ComparisonResult};

/// Unique, time-ordered identifier of a comparison, attached to its logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComparisonId(Uuid);

impl ComparisonId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ComparisonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComparisonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Computed<E: ScopeElement> {
    mapping: Mapping<E>,
    differences: DifferenceSet<E>,
}

/// A two- or three-way comparison between editable scopes.
pub struct Comparison<S: EditableTreeDataScope> {
    id: ComparisonId,
    config: ComparisonConfig,
    scopes: RoleMap<Option<S>>,
    computed: Option<Computed<S::Element>>,
    match_policy: Option<Arc<dyn MatchPolicy<S::Element>>>,
    diff_policy: Option<Arc<dyn DiffPolicy<S::Element>>>,
    merge_policy: Option<Arc<dyn MergePolicy<S::Element>>>,
}

impl<S: EditableTreeDataScope> Comparison<S> {
    /// A two-way comparison.
    pub fn new(target: S, reference: S) -> Self {
        Self::with_scopes(RoleMap::new(Some(target), Some(reference), None))
    }

    /// A three-way comparison against a common ancestor.
    pub fn new_three_way(target: S, reference: S, ancestor: S) -> Self {
        Self::with_scopes(RoleMap::new(Some(target), Some(reference), Some(ancestor)))
    }

    fn with_scopes(scopes: RoleMap<Option<S>>) -> Self {
        Self {
            id: ComparisonId::new(),
            config: ComparisonConfig::default(),
            scopes,
            computed: None,
            match_policy: None,
            diff_policy: None,
            merge_policy: None,
        }
    }

    pub fn with_config(mut self, config: ComparisonConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> ComparisonId {
        self.id
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    // ---- Computation ----

    /// Match the scopes and compute their differences.
    ///
    /// `None` policies fall back to [`PathMatchPolicy`],
    /// [`DefaultDiffPolicy`] and [`DefaultMergePolicy`]. Returns
    /// `Warning` when duplicate match keys make the comparison
    /// inconsistent.
    pub fn compute(
        &mut self,
        match_policy: Option<Arc<dyn MatchPolicy<S::Element>>>,
        diff_policy: Option<Arc<dyn DiffPolicy<S::Element>>>,
        merge_policy: Option<Arc<dyn MergePolicy<S::Element>>>,
        monitor: &dyn ProgressMonitor,
    ) -> Status {
        let match_policy = match_policy.unwrap_or_else(default_match_policy);
        let diff_policy = diff_policy.unwrap_or_else(default_diff_policy);
        let merge_policy = merge_policy.unwrap_or_else(default_merge_policy);
        info!(
            comparison = %self.id,
            match_policy = match_policy.name(),
            diff_policy = diff_policy.name(),
            three_way = self.is_three_way(),
            "computing comparison"
        );

        let scopes: ScopeSet<'_, S::Element> = RoleMap::from_fn(|role| {
            self.scopes
                .get(role)
                .as_ref()
                .map(|s| s as &dyn TreeDataScope<Element = S::Element>)
        });
        let result = run(
            &scopes,
            match_policy.as_ref(),
            diff_policy.as_ref(),
            &self.config,
            monitor,
        );

        match result {
            Ok(computed) => {
                let inconsistent = roles_with_duplicates(&computed.mapping);
                info!(
                    comparison = %self.id,
                    matches = computed.mapping.len(),
                    differences = computed.differences.len(),
                    consistent = inconsistent.is_empty(),
                    "comparison computed"
                );
                self.computed = Some(computed);
                self.match_policy = Some(match_policy);
                self.diff_policy = Some(diff_policy);
                self.merge_policy = Some(merge_policy);
                if inconsistent.is_empty() {
                    Status::Ok
                } else {
                    Status::warning(format!("duplicate match keys in {inconsistent}"))
                }
            }
            Err(ComparisonError::Match(MatchError::Cancelled))
            | Err(ComparisonError::Diff(DiffError::Cancelled)) => {
                info!(comparison = %self.id, "comparison cancelled");
                Status::Cancelled
            }
            Err(err) => {
                warn!(comparison = %self.id, error = %err, "comparison failed");
                Status::error(err.to_string())
            }
        }
    }

    /// Drop the computed state; the comparison becomes EMPTY.
    pub fn clear(&mut self) {
        self.computed = None;
        self.match_policy = None;
        self.diff_policy = None;
        self.merge_policy = None;
        info!(comparison = %self.id, "comparison cleared");
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// `false` iff the last computation found duplicate match keys.
    pub fn is_consistent(&self) -> bool {
        self.computed
            .as_ref()
            .map_or(true, |c| c.mapping.is_consistent())
    }

    /// Keys shared by several elements of `role`.
    pub fn duplicate_match_ids(&self, role: Role) -> &[MatchKey] {
        match &self.computed {
            Some(c) => c.mapping.duplicate_keys(role),
            None => &[],
        }
    }

    /// Exchange TARGET and REFERENCE. Only allowed before `compute()`.
    pub fn swap_scopes(&mut self) -> bool {
        if self.is_computed() {
            return false;
        }
        self.scopes.swap_sides();
        true
    }

    // ---- Scopes ----

    pub fn is_three_way(&self) -> bool {
        self.scopes.get(Role::Ancestor).is_some()
    }

    pub fn scope(&self, role: Role) -> Option<&S> {
        self.scopes.get(role).as_ref()
    }

    /// Mutable access to a scope. Edits made here are not reflected in the
    /// differences until the next `compute()`.
    pub fn scope_mut(&mut self, role: Role) -> Option<&mut S> {
        self.scopes.get_mut(role).as_mut()
    }

    pub fn into_scopes(self) -> RoleMap<Option<S>> {
        self.scopes
    }

    // ---- Matches ----

    pub fn mapping(&self) -> Option<&Mapping<S::Element>> {
        self.computed.as_ref().map(|c| &c.mapping)
    }

    /// Root matches of every role, TARGET's first.
    pub fn contents(&self) -> Vec<MatchId> {
        let mut result = Vec::new();
        for role in Role::ALL {
            for id in self.contents_in(role) {
                if !result.contains(&id) {
                    result.push(id);
                }
            }
        }
        result
    }

    /// Matches of the roots of `role`, in scope order.
    pub fn contents_in(&self, role: Role) -> Vec<MatchId> {
        match self.scope(role) {
            Some(scope) => self.matches_of(scope.roots(), role),
            None => Vec::new(),
        }
    }

    /// Child matches of `id` in every role.
    pub fn contents_of(&self, id: MatchId) -> Vec<MatchId> {
        let mut result = Vec::new();
        for role in Role::ALL {
            for child in self.contents_of_in(id, role) {
                if !result.contains(&child) {
                    result.push(child);
                }
            }
        }
        result
    }

    /// Child matches of `id` in `role`, in scope order.
    pub fn contents_of_in(&self, id: MatchId, role: Role) -> Vec<MatchId> {
        let element = self.mapping().and_then(|m| m.element(id, role));
        match (self.scope(role), element) {
            (Some(scope), Some(element)) => self.matches_of(scope.children(element), role),
            _ => Vec::new(),
        }
    }

    pub fn container_of(&self, id: MatchId, role: Role) -> Option<MatchId> {
        self.mapping()?.get(id)?.container(role)
    }

    /// Matches of every element of `role`, depth-first.
    pub fn all_contents(&self, role: Role) -> impl Iterator<Item = MatchId> + '_ {
        let mapping = self.mapping();
        self.scope(role)
            .into_iter()
            .flat_map(|scope| scope.all_contents())
            .filter_map(move |element| mapping?.match_for(&element, role))
    }

    fn matches_of(&self, elements: Vec<S::Element>, role: Role) -> Vec<MatchId> {
        let Some(mapping) = self.mapping() else {
            return Vec::new();
        };
        elements
            .iter()
            .filter_map(|e| mapping.match_for(e, role))
            .collect()
    }

    // ---- Differences ----

    /// Live differences, in creation order.
    pub fn remaining_differences(&self) -> Vec<&Difference<S::Element>> {
        match &self.computed {
            Some(c) => c.differences.iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn has_remaining_differences(&self) -> bool {
        self.computed
            .as_ref()
            .is_some_and(|c| !c.differences.is_empty())
    }

    pub fn nb_differences(&self) -> usize {
        self.computed.as_ref().map_or(0, |c| c.differences.len())
    }

    /// Live attribute and reference value differences.
    pub fn nb_no_containment_differences(&self) -> usize {
        self.computed
            .as_ref()
            .map_or(0, |c| c.differences.no_containment_count())
    }

    /// Live differences present in `role`.
    pub fn differences(&self, role: Role) -> Vec<&Difference<S::Element>> {
        match &self.computed {
            Some(c) => c.differences.in_role(role).collect(),
            None => Vec::new(),
        }
    }

    /// Any difference of the last computation, live or merged.
    pub fn difference(&self, id: DifferenceId) -> Option<&Difference<S::Element>> {
        self.computed.as_ref()?.differences.get(id)
    }

    pub fn summary(&self) -> DiffSummary {
        self.computed
            .as_ref()
            .map(|c| c.differences.summary())
            .unwrap_or_default()
    }

    pub fn last_match_policy(&self) -> Option<&Arc<dyn MatchPolicy<S::Element>>> {
        self.match_policy.as_ref()
    }

    pub fn last_diff_policy(&self) -> Option<&Arc<dyn DiffPolicy<S::Element>>> {
        self.diff_policy.as_ref()
    }

    pub fn last_merge_policy(&self) -> Option<&Arc<dyn MergePolicy<S::Element>>> {
        self.merge_policy.as_ref()
    }

    // ---- Merging ----

    /// Merge the given differences into `destination`.
    ///
    /// Blocked differences stay live and are listed in the report.
    pub fn merge(
        &mut self,
        ids: &[DifferenceId],
        destination: Role,
        update_references: bool,
        monitor: &dyn ProgressMonitor,
    ) -> ComparisonResult<MergeReport> {
        self.check_mergeable()?;
        let options = self.config.merge_options(update_references);
        let policy: &dyn MergePolicy<S::Element> = match &self.merge_policy {
            Some(p) => p.as_ref(),
            None => &DefaultMergePolicy,
        };
        let computed = self.computed.as_mut().ok_or(ComparisonError::NotComputed)?;
        let (dest, source) = self
            .scopes
            .split_mut(destination, destination.opposite())
            .ok_or(MergeError::InvalidDestination(destination))?;
        let (Some(dest), Some(source)) = (dest.as_mut(), source.as_ref()) else {
            return Err(MergeError::InvalidDestination(destination).into());
        };

        let report = Merger::new(
            destination,
            dest,
            source,
            &mut computed.mapping,
            &mut computed.differences,
        )?
        .with_options(options)
        .run(ids, policy, monitor)?;

        info!(
            comparison = %self.id,
            %destination,
            merged = report.merged.len(),
            blocked = report.blocked.len(),
            remaining = computed.differences.len(),
            "merge applied"
        );
        Ok(report)
    }

    /// Merge every live difference into `destination`.
    ///
    /// Conflicting differences are included only when the merge policy of
    /// the last computation resolves them towards `destination`.
    pub fn merge_all(
        &mut self,
        destination: Role,
        update_references: bool,
        monitor: &dyn ProgressMonitor,
    ) -> ComparisonResult<MergeReport> {
        let computed = self.computed.as_ref().ok_or(ComparisonError::NotComputed)?;
        let policy: &dyn MergePolicy<S::Element> = match &self.merge_policy {
            Some(p) => p.as_ref(),
            None => &DefaultMergePolicy,
        };
        let ids: Vec<DifferenceId> = computed
            .differences
            .iter()
            .filter(|d| {
                !d.is_conflicting() || policy.resolve_conflict(d, destination) == Some(true)
            })
            .map(|d| d.id())
            .collect();
        self.merge(&ids, destination, update_references, monitor)
    }

    /// Merge the live differences chosen by `selector` into its destination.
    pub fn merge_selected(
        &mut self,
        selector: &dyn MergeSelector<S::Element>,
        update_references: bool,
        monitor: &dyn ProgressMonitor,
    ) -> ComparisonResult<MergeReport> {
        let computed = self.computed.as_ref().ok_or(ComparisonError::NotComputed)?;
        let ids: Vec<DifferenceId> = computed
            .differences
            .iter()
            .filter(|d| selector.selects(d, &computed.mapping))
            .map(|d| d.id())
            .collect();
        self.merge(&ids, selector.destination(), update_references, monitor)
    }

    fn check_mergeable(&self) -> ComparisonResult<()> {
        let computed = self.computed.as_ref().ok_or(ComparisonError::NotComputed)?;
        if !self.config.allow_merge_when_inconsistent && !computed.mapping.is_consistent() {
            return Err(ComparisonError::Inconsistent(roles_with_duplicates(
                &computed.mapping,
            )));
        }
        Ok(())
    }
}

fn run<E: ScopeElement>(
    scopes: &ScopeSet<'_, E>,
    matching: &dyn MatchPolicy<E>,
    diff: &dyn DiffPolicy<E>,
    config: &ComparisonConfig,
    monitor: &dyn ProgressMonitor,
) -> ComparisonResult<Computed<E>> {
    let mut mapping = build_mapping(scopes, matching, monitor)?;
    let differences = compute_differences(
        scopes,
        &mut mapping,
        DiffPolicies { diff, matching },
        &config.diff_options(),
        monitor,
    )?;
    Ok(Computed {
        mapping,
        differences,
    })
}

/// Comma-separated roles holding duplicate keys; empty when consistent.
fn roles_with_duplicates<E: ScopeElement>(mapping: &Mapping<E>) -> String {
    Role::ALL
        .into_iter()
        .filter(|r| !mapping.duplicate_keys(*r).is_empty())
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_match_policy<E: ScopeElement>() -> Arc<dyn MatchPolicy<E>> {
    Arc::new(PathMatchPolicy)
}

fn default_diff_policy<E: ScopeElement>() -> Arc<dyn DiffPolicy<E>> {
    Arc::new(DefaultDiffPolicy)
}

fn default_merge_policy<E: ScopeElement>() -> Arc<dyn MergePolicy<E>> {
    Arc::new(DefaultMergePolicy)
}
