//! Application of differences to a destination scope.
//!
//! A [`Merger`] edits one side of a comparison so that it takes the state
//! of the other side for every selected difference. Differences are tried
//! one at a time in the order chosen by the [`MergePolicy`]; one that cannot
//! be applied is reported as blocked and stays live, the rest of the batch
//! goes on. The mapping and difference set are updated in step with every
//! edit, so a merge interrupted by cancellation leaves them consistent with
//! the destination scope.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::{debug, info, warn};

use arbor_diff::{Difference, DifferenceKind, DifferenceSet};
use arbor_match::Mapping;
use arbor_scope::{EditableTreeDataScope, TreeDataScope};
use arbor_types::{AttributeValue, DifferenceId, Feature, MatchId, ProgressMonitor, Role};

use crate::error::{MergeError, MergeResult};
use crate::policy::MergePolicy;
use crate::report::{BlockReason, BlockedDifference, MergeReport};

/// Switches for a merge call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Create reference targets missing from the destination instead of
    /// blocking the reference.
    pub update_references: bool,
    /// Bound on nested creation of reference targets and their containers.
    pub max_dependency_depth: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            update_references: true,
            max_dependency_depth: 64,
        }
    }
}

/// One merge into one destination role.
pub struct Merger<'a, S: EditableTreeDataScope> {
    destination: Role,
    source_role: Role,
    dest: &'a mut S,
    source: &'a dyn TreeDataScope<Element = S::Element>,
    mapping: &'a mut Mapping<S::Element>,
    differences: &'a mut DifferenceSet<S::Element>,
    options: MergeOptions,
    report: MergeReport,
    /// Matches whose destination element was created by this merge.
    added: Vec<MatchId>,
    /// Live differences selected for this merge.
    selected: HashSet<DifferenceId>,
}

impl<'a, S: EditableTreeDataScope> Merger<'a, S> {
    /// Prepare a merge of `source` into `dest`, which plays `destination`.
    pub fn new(
        destination: Role,
        dest: &'a mut S,
        source: &'a dyn TreeDataScope<Element = S::Element>,
        mapping: &'a mut Mapping<S::Element>,
        differences: &'a mut DifferenceSet<S::Element>,
    ) -> MergeResult<Self> {
        if !destination.is_side() {
            return Err(MergeError::InvalidDestination(destination));
        }
        if dest.is_read_only() {
            return Err(MergeError::ReadOnlyScope(dest.label().to_string()));
        }
        Ok(Self {
            destination,
            source_role: destination.opposite(),
            dest,
            source,
            mapping,
            differences,
            options: MergeOptions::default(),
            report: MergeReport::new(destination),
            added: Vec::new(),
            selected: HashSet::new(),
        })
    }

    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Merge the `selected` differences.
    ///
    /// Retired ids in `selected` are skipped. An id unknown to the
    /// difference set aborts the call before any edit.
    pub fn run(
        mut self,
        selected: &[DifferenceId],
        policy: &dyn MergePolicy<S::Element>,
        monitor: &dyn ProgressMonitor,
    ) -> MergeResult<MergeReport> {
        let mut ids = Vec::with_capacity(selected.len());
        for &id in selected {
            if self.differences.get(id).is_none() {
                return Err(MergeError::UnknownDifference(id));
            }
            if self.differences.is_live(id) && !ids.contains(&id) {
                ids.push(id);
            }
        }
        policy.order(&mut ids, &*self.differences, &*self.mapping, self.destination)?;
        self.selected = ids.iter().copied().collect();

        monitor.begin_task("merge", Some(ids.len()));
        for id in ids {
            if monitor.is_cancelled() {
                self.report.cancelled = true;
                info!(destination = %self.destination, "merge cancelled");
                break;
            }
            if self.differences.is_live(id) {
                match self.apply(id) {
                    Ok(()) => debug!(difference = %id, "merged difference"),
                    Err(reason) => {
                        debug!(difference = %id, %reason, "blocked difference");
                        self.report.blocked.push(BlockedDifference { id, reason });
                    }
                }
            }
            monitor.worked(1);
        }
        self.complete_references();
        monitor.done();

        debug!(
            destination = %self.destination,
            merge_policy = policy.name(),
            merged = self.report.merged.len(),
            retired = self.report.retired.len(),
            blocked = self.report.blocked.len(),
            "merge finished"
        );
        Ok(self.report)
    }

    fn apply(&mut self, id: DifferenceId) -> Result<(), BlockReason> {
        let Some(d) = self.differences.get(id).cloned() else {
            return Ok(());
        };
        match d.kind() {
            DifferenceKind::ElementPresence { .. } if d.presence_role() == self.destination => {
                let removed = self.remove(d.element_match())?;
                self.settle(id);
                self.retire_moot(&removed);
            }
            DifferenceKind::ElementPresence { .. } => {
                self.add(d.element_match())?;
                self.settle(id);
            }
            DifferenceKind::AttributeValue {
                feature,
                value,
                is_order,
            } => self.apply_attribute(&d, feature, value, *is_order)?,
            DifferenceKind::ReferenceValue {
                feature,
                value_match,
                is_order,
                ..
            } => self.apply_reference(&d, feature, *value_match, *is_order)?,
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Elements
    // ---------------------------------------------------------------

    /// Create the destination counterpart of match `id` under the
    /// counterpart of its source container.
    fn add(&mut self, id: MatchId) -> Result<S::Element, BlockReason> {
        let (dst, src) = (self.destination, self.source_role);
        let m = self.mapping.get(id).ok_or(BlockReason::MissingElement {
            match_id: id,
            role: src,
        })?;
        if let Some(existing) = m.element(dst) {
            return Ok(existing.clone());
        }
        let element = m.element(src).cloned().ok_or(BlockReason::MissingElement {
            match_id: id,
            role: src,
        })?;
        let owner = m.container(src);
        let parent = match owner {
            Some(o) => Some(
                self.mapping
                    .element(o, dst)
                    .cloned()
                    .ok_or(BlockReason::MissingContainer(o))?,
            ),
            None => None,
        };

        let position = self.aligned_position(&element, parent.as_ref());
        let created = self.dest.create_element(&self.source.kind(&element))?;
        if let Err(reason) = self.populate(&element, &created, parent.as_ref(), position) {
            if let Err(err) = self.dest.remove_element(&created) {
                warn!(match_id = %id, %err, "failed addition left a detached element");
            }
            return Err(reason);
        }

        self.mapping.add_element(id, dst, created.clone());
        self.mapping.set_container(id, dst, owner);
        self.added.push(id);
        Ok(created)
    }

    /// Copy the attributes of source `element` onto the detached `created`
    /// and attach it.
    fn populate(
        &mut self,
        element: &S::Element,
        created: &S::Element,
        parent: Option<&S::Element>,
        position: usize,
    ) -> Result<(), BlockReason> {
        for feature in self.source.features(element) {
            if !feature.is_attribute() {
                continue;
            }
            let values = self.source.attribute_values(element, &feature);
            if !values.is_empty() {
                self.dest.set_attribute_values(created, &feature, values)?;
            }
        }
        self.dest.add_child(parent, created, Some(position))?;
        Ok(())
    }

    /// Insertion index for the counterpart of source `element`: right after
    /// the last preceding source sibling that exists in the destination.
    fn aligned_position(&self, element: &S::Element, parent: Option<&S::Element>) -> usize {
        let (dst, src) = (self.destination, self.source_role);
        let siblings = match self.source.container(element) {
            Some(p) => self.source.children(&p),
            None => self.source.roots(),
        };
        let preceding: Vec<S::Element> = siblings
            .iter()
            .take_while(|s| *s != element)
            .filter_map(|s| self.mapping.match_for(s, src))
            .filter_map(|m| self.mapping.element(m, dst).cloned())
            .collect();
        let current = match parent {
            Some(p) => self.dest.children(p),
            None => self.dest.roots(),
        };
        insertion_point(&current, &preceding)
    }

    /// Delete the destination element of match `id` with its subtree.
    /// Returns the matches that lost their destination element.
    ///
    /// Descendants whose match the source keeps elsewhere are first moved
    /// under the counterpart of their source container.
    fn remove(&mut self, id: MatchId) -> Result<HashSet<MatchId>, BlockReason> {
        let dst = self.destination;
        let element = self
            .mapping
            .element(id, dst)
            .cloned()
            .ok_or(BlockReason::MissingElement {
                match_id: id,
                role: dst,
            })?;
        let (relocations, doomed) = self.plan_relocations(&element)?;
        let writes = if self.dest.requires_disconnection() {
            self.plan_disconnection(&doomed)?
        } else {
            Vec::new()
        };

        for r in &relocations {
            let position = self.aligned_position(&r.source, r.parent.as_ref());
            self.dest
                .move_element(&r.element, r.parent.as_ref(), Some(position))?;
            self.mapping.set_container(r.match_id, dst, r.owner);
            debug!(match_id = %r.match_id, "relocated kept descendant");
        }
        for (holder, feature, kept) in writes {
            self.dest
                .set_reference_values(&holder, &feature, kept)
                .map_err(|err| BlockReason::Disconnection(err.to_string()))?;
        }
        self.dest.remove_element(&element)?;

        let mut removed = HashSet::new();
        for e in &doomed {
            if let Some(m) = self.mapping.match_for(e, dst) {
                self.mapping.disconnect(dst, e);
                removed.insert(m);
            }
        }
        Ok(removed)
    }

    /// Descendants of `element` that the source keeps, with their new
    /// places, outermost first, plus the elements left to delete.
    fn plan_relocations(
        &self,
        element: &S::Element,
    ) -> Result<(Vec<Relocation<S::Element>>, Vec<S::Element>), BlockReason> {
        let (dst, src) = (self.destination, self.source_role);
        let subtree = self.dest.subtree(element);
        let mut doomed: HashSet<S::Element> = subtree.iter().cloned().collect();
        let mut pending: Vec<(MatchId, S::Element)> = subtree
            .iter()
            .skip(1)
            .filter_map(|e| {
                let m = self.mapping.match_for(e, dst)?;
                self.mapping.element(m, src).map(|_| (m, e.clone()))
            })
            .collect();

        let mut plan = Vec::new();
        while !pending.is_empty() {
            let mut waiting = Vec::new();
            let before = plan.len();
            for (match_id, e) in pending {
                if !doomed.contains(&e) {
                    continue;
                }
                let m = self.mapping.get(match_id).ok_or(BlockReason::MissingElement {
                    match_id,
                    role: src,
                })?;
                let source = m.element(src).cloned().ok_or(BlockReason::MissingElement {
                    match_id,
                    role: src,
                })?;
                let owner = m.container(src);
                let parent = match owner {
                    Some(o) => Some(
                        self.mapping
                            .element(o, dst)
                            .cloned()
                            .ok_or(BlockReason::MissingContainer(o))?,
                    ),
                    None => None,
                };
                if parent.as_ref().is_some_and(|p| doomed.contains(p)) {
                    waiting.push((match_id, e));
                    continue;
                }
                for moved in self.dest.subtree(&e) {
                    doomed.remove(&moved);
                }
                plan.push(Relocation {
                    match_id,
                    element: e,
                    source,
                    parent,
                    owner,
                });
            }
            if plan.len() == before {
                if let Some((match_id, _)) = waiting.first() {
                    return Err(BlockReason::DisplacedDescendant(*match_id));
                }
            }
            pending = waiting;
        }

        let doomed = subtree.into_iter().filter(|e| doomed.contains(e)).collect();
        Ok((plan, doomed))
    }

    /// New values for references into `doomed` held outside it.
    ///
    /// References covered by a selected difference are left to that
    /// difference; if one still points into `doomed` the removal is blocked.
    fn plan_disconnection(
        &self,
        doomed: &[S::Element],
    ) -> Result<Vec<(S::Element, Feature, Vec<S::Element>)>, BlockReason> {
        let inside: HashSet<&S::Element> = doomed.iter().collect();
        let mut writes: Vec<(S::Element, Feature, Vec<S::Element>)> = Vec::new();
        for e in doomed {
            for (holder, feature) in self.dest.incoming_references(e) {
                if inside.contains(&holder)
                    || writes
                        .iter()
                        .any(|(h, f, _)| *h == holder && f.name == feature.name)
                {
                    continue;
                }
                if self.covered(&holder, &feature, doomed) {
                    return Err(BlockReason::Disconnection(format!(
                        "reference '{}' is covered by a pending difference",
                        feature.name
                    )));
                }
                let kept: Vec<S::Element> = self
                    .dest
                    .reference_values(&holder, &feature)
                    .into_iter()
                    .filter(|t| !inside.contains(t))
                    .collect();
                writes.push((holder, feature, kept));
            }
        }
        Ok(writes)
    }

    /// Whether a live selected difference is about the reference from
    /// `holder` through `feature` to one of `targets`.
    fn covered(&self, holder: &S::Element, feature: &Feature, targets: &[S::Element]) -> bool {
        let dst = self.destination;
        let Some(holder_match) = self.mapping.match_for(holder, dst) else {
            return false;
        };
        let target_matches: HashSet<MatchId> = targets
            .iter()
            .filter_map(|t| self.mapping.match_for(t, dst))
            .collect();
        self.differences.for_match(holder_match).any(|d| {
            self.selected.contains(&d.id())
                && d.feature().is_some_and(|f| f.name == feature.name)
                && d.value_match().is_some_and(|v| target_matches.contains(&v))
        })
    }

    // ---------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------

    fn apply_attribute(
        &mut self,
        d: &Difference<S::Element>,
        feature: &Feature,
        value: &AttributeValue,
        is_order: bool,
    ) -> Result<(), BlockReason> {
        let (holder, source_holder) = self.holders(d.element_match())?;
        let mut values = self.dest.attribute_values(&holder, feature);
        let wanted = self.source.attribute_values(&source_holder, feature);
        let mut whole = !feature.many || is_order;

        if whole {
            values = wanted;
        } else {
            if d.presence_role() == self.destination {
                if let Some(i) = first_surplus(&values, &wanted, value) {
                    values.remove(i);
                }
            } else {
                let position = position_for_addition(&values, &wanted, value, feature.ordered);
                values.insert(position, value.clone());
            }
            // The last value merged into an ordered feature brings the
            // source order with it.
            if feature.ordered && same_multiset(&values, &wanted) {
                values = wanted;
                whole = true;
            }
        }
        self.dest.set_attribute_values(&holder, feature, values)?;

        self.settle(d.id());
        if whole {
            self.retire_feature(d.element_match(), feature);
        }
        Ok(())
    }

    fn apply_reference(
        &mut self,
        d: &Difference<S::Element>,
        feature: &Feature,
        value_match: MatchId,
        is_order: bool,
    ) -> Result<(), BlockReason> {
        let (dst, src) = (self.destination, self.source_role);
        let (holder, source_holder) = self.holders(d.element_match())?;
        let current = self.dest.reference_values(&holder, feature);
        let wanted = self.source.reference_values(&source_holder, feature);
        let mut whole = !feature.many || is_order;

        let values = if whole {
            let mut values = Vec::with_capacity(wanted.len());
            for target in &wanted {
                let m = self
                    .mapping
                    .match_for(target, src)
                    .ok_or(BlockReason::UnmappedReference)?;
                values.push(self.ensure_target(m, 0)?);
            }
            values
        } else {
            let current_keys: Vec<Option<MatchId>> = current
                .iter()
                .map(|e| self.mapping.match_for(e, dst))
                .collect();
            let wanted_keys: Vec<Option<MatchId>> = wanted
                .iter()
                .map(|e| self.mapping.match_for(e, src))
                .collect();
            let key = Some(value_match);
            let mut values = current;
            if d.presence_role() == dst {
                let index = first_surplus(&current_keys, &wanted_keys, &key)
                    .or_else(|| current_keys.iter().position(|k| *k == key));
                if let Some(i) = index {
                    values.remove(i);
                }
            } else {
                let target = self.ensure_target(value_match, 0)?;
                let position =
                    position_for_addition(&current_keys, &wanted_keys, &key, feature.ordered);
                values.insert(position, target);
            }
            let keys: Vec<Option<MatchId>> = values
                .iter()
                .map(|e| self.mapping.match_for(e, dst))
                .collect();
            if feature.ordered && same_multiset(&keys, &wanted_keys) {
                whole = true;
                follow_order(&values, &keys, &wanted_keys)
            } else {
                values
            }
        };
        self.dest.set_reference_values(&holder, feature, values)?;

        self.settle(d.id());
        if whole {
            self.retire_feature(d.element_match(), feature);
        }
        Ok(())
    }

    /// Destination and source elements of a match present on both sides.
    fn holders(&self, id: MatchId) -> Result<(S::Element, S::Element), BlockReason> {
        let element = |role| {
            self.mapping
                .element(id, role)
                .cloned()
                .ok_or(BlockReason::MissingElement { match_id: id, role })
        };
        Ok((element(self.destination)?, element(self.source_role)?))
    }

    // ---------------------------------------------------------------
    // Reference targets
    // ---------------------------------------------------------------

    /// The destination element of match `id`, created if allowed.
    fn ensure_target(&mut self, id: MatchId, depth: usize) -> Result<S::Element, BlockReason> {
        if let Some(existing) = self.mapping.element(id, self.destination) {
            return Ok(existing.clone());
        }
        if !self.options.update_references {
            return Err(BlockReason::MissingReferenceTarget(id));
        }
        self.materialize(id, depth)
    }

    /// Merge the live addition of match `id`, creating missing containers
    /// first.
    fn materialize(&mut self, id: MatchId, depth: usize) -> Result<S::Element, BlockReason> {
        if depth > self.options.max_dependency_depth {
            return Err(BlockReason::DependencyTooDeep(self.options.max_dependency_depth));
        }
        let presence = self
            .differences
            .presence_of(id)
            .filter(|p| p.presence_role() == self.source_role)
            .map(|p| p.id())
            .ok_or(BlockReason::MissingReferenceTarget(id))?;
        let owner = self
            .mapping
            .get(id)
            .and_then(|m| m.container(self.source_role));
        if let Some(owner) = owner {
            if self.mapping.element(owner, self.destination).is_none() {
                self.materialize(owner, depth + 1)?;
            }
        }
        let element = self.add(id)?;
        self.settle(presence);
        self.report.blocked.retain(|b| b.id != presence);
        debug!(match_id = %id, difference = %presence, depth, "materialized element");
        Ok(element)
    }

    /// Set the references of elements created by this merge.
    fn complete_references(&mut self) {
        let mut next = 0;
        while let Some(&id) = self.added.get(next) {
            next += 1;
            if let Err(reason) = self.copy_references(id) {
                warn!(match_id = %id, %reason, "references of added element left incomplete");
            }
        }
    }

    fn copy_references(&mut self, id: MatchId) -> Result<(), BlockReason> {
        let (created, element) = self.holders(id)?;
        for feature in self.source.features(&element) {
            if !feature.is_reference() {
                continue;
            }
            let mut values = Vec::new();
            for target in self.source.reference_values(&element, &feature) {
                let Some(m) = self.mapping.match_for(&target, self.source_role) else {
                    continue;
                };
                match self.ensure_target(m, 1) {
                    Ok(e) => values.push(e),
                    Err(reason) => {
                        debug!(match_id = %id, feature = %feature, %reason, "reference skipped")
                    }
                }
            }
            if !values.is_empty() {
                self.dest.set_reference_values(&created, &feature, values)?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Bookkeeping
    // ---------------------------------------------------------------

    /// Retire a merged difference and its symmetric counterpart.
    fn settle(&mut self, id: DifferenceId) {
        if self.differences.retire(id) {
            self.report.merged.push(id);
        }
        if let Some(counterpart) = self.differences.counterpart(id) {
            if self.differences.retire(counterpart) {
                self.report.retired.push(counterpart);
            }
        }
    }

    /// Retire differences that a whole-feature write made moot.
    fn retire_feature(&mut self, id: MatchId, feature: &Feature) {
        let moot: Vec<DifferenceId> = self
            .differences
            .for_match(id)
            .filter(|d| {
                d.feature()
                    .is_some_and(|f| f.name == feature.name && f.kind == feature.kind)
            })
            .map(|d| d.id())
            .collect();
        self.retire_all(moot);
    }

    /// Retire differences about removed matches and destination references
    /// to them.
    fn retire_moot(&mut self, removed: &HashSet<MatchId>) {
        let dst = self.destination;
        let moot: Vec<DifferenceId> = self
            .differences
            .iter()
            .filter(|d| {
                removed.contains(&d.element_match())
                    || (d.presence_role() == dst
                        && d.value_match().is_some_and(|v| removed.contains(&v)))
            })
            .map(|d| d.id())
            .collect();
        self.retire_all(moot);
    }

    fn retire_all(&mut self, ids: Vec<DifferenceId>) {
        for id in ids {
            if self.differences.retire(id) {
                self.report.retired.push(id);
            }
        }
    }
}

/// A destination element to take out of a subtree before it is deleted.
struct Relocation<E> {
    match_id: MatchId,
    element: E,
    /// The element's counterpart in the source.
    source: E,
    /// New destination container, `None` for the roots.
    parent: Option<E>,
    owner: Option<MatchId>,
}

/// Index right after the last entry of `preceding` found in `current`, or 0.
fn insertion_point<K: PartialEq>(current: &[K], preceding: &[K]) -> usize {
    preceding
        .iter()
        .rev()
        .find_map(|p| current.iter().rposition(|c| c == p))
        .map_or(0, |i| i + 1)
}

/// Where to insert `value` into `current` so that it follows the values
/// preceding it in `wanted`. Unordered features append.
fn position_for_addition<K: Eq + Hash>(
    current: &[K],
    wanted: &[K],
    value: &K,
    ordered: bool,
) -> usize {
    if !ordered {
        return current.len();
    }
    let index = first_surplus(wanted, current, value).unwrap_or(wanted.len());
    insertion_point(current, &wanted[..index])
}

fn same_multiset<K: Eq + Hash>(left: &[K], right: &[K]) -> bool {
    let mut counts: HashMap<&K, isize> = HashMap::new();
    for k in left {
        *counts.entry(k).or_default() += 1;
    }
    for k in right {
        *counts.entry(k).or_default() -= 1;
    }
    left.len() == right.len() && counts.values().all(|n| *n == 0)
}

/// `values` rearranged so that their `keys` follow `wanted`.
fn follow_order<T: Clone, K: PartialEq>(values: &[T], keys: &[K], wanted: &[K]) -> Vec<T> {
    let mut used = vec![false; keys.len()];
    let mut result = Vec::with_capacity(values.len());
    for w in wanted {
        if let Some(i) = (0..keys.len()).find(|&i| !used[i] && keys[i] == *w) {
            used[i] = true;
            result.push(values[i].clone());
        }
    }
    result
}

/// First index of `mine` holding `value` beyond its multiplicity in
/// `theirs`.
fn first_surplus<K: Eq + Hash>(mine: &[K], theirs: &[K], value: &K) -> Option<usize> {
    let mut remaining: HashMap<&K, usize> = HashMap::new();
    for k in theirs {
        *remaining.entry(k).or_default() += 1;
    }
    for (i, k) in mine.iter().enumerate() {
        match remaining.get_mut(k) {
            Some(n) if *n > 0 => *n -= 1,
            _ if k == value => return Some(i),
            _ => {}
        }
    }
    None
}
