//! Difference computation over a built [`Mapping`].
//!
//! Every match is visited once, in creation order:
//!
//! - a match with an element in exactly one of TARGET/REFERENCE yields an
//!   element presence in that role;
//! - a match with both yields value presences for every covered feature.
//!   Values are compared as multisets; when the multisets agree but an
//!   ordered feature lists them differently, one order difference per role
//!   is emitted instead.
//!
//! Reference values are compared through their matches. A reference to an
//! element outside the enumerated content gets a completed match when
//! [`DiffOptions::complete_references`] is set and is skipped otherwise.
//!
//! In three-way mode every difference is classified against the ancestor.

use std::collections::HashMap;
use std::hash::Hash;

use similar::{capture_diff_slices, Algorithm, DiffTag};
use tracing::debug;

use arbor_match::{Mapping, MatchPolicy, ScopeSet};
use arbor_scope::{ScopeElement, TreeDataScope};
use arbor_types::{
    AttributeValue, DifferenceId, Feature, FeatureKind, MatchId, ProgressMonitor, Role,
};

use crate::difference::DifferenceKind;
use crate::error::{DiffError, DiffResult};
use crate::policy::DiffPolicy;
use crate::set::DifferenceSet;

/// Switches for difference computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// Create completed matches for references leaving the content.
    pub complete_references: bool,
    /// Report order-only differences on ordered features.
    pub detect_order: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            complete_references: true,
            detect_order: true,
        }
    }
}

/// Policies consulted while computing differences.
///
/// The match policy is needed to key completed matches.
pub struct DiffPolicies<'p, E: ScopeElement> {
    pub diff: &'p dyn DiffPolicy<E>,
    pub matching: &'p dyn MatchPolicy<E>,
}

impl<E: ScopeElement> Clone for DiffPolicies<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ScopeElement> Copy for DiffPolicies<'_, E> {}

/// Compute the differences between the scopes covered by `mapping`.
///
/// The mapping is extended with completed matches. Cancellation is polled
/// once per match.
pub fn compute_differences<E: ScopeElement>(
    scopes: &ScopeSet<'_, E>,
    mapping: &mut Mapping<E>,
    policies: DiffPolicies<'_, E>,
    options: &DiffOptions,
    monitor: &dyn ProgressMonitor,
) -> DiffResult<DifferenceSet<E>> {
    let target = (*scopes.get(Role::Target)).ok_or(DiffError::MissingScope(Role::Target))?;
    let reference =
        (*scopes.get(Role::Reference)).ok_or(DiffError::MissingScope(Role::Reference))?;

    let mut builder = Builder {
        scopes: RoleScopes {
            target,
            reference,
            ancestor: *scopes.get(Role::Ancestor),
        },
        mapping,
        policies,
        options: *options,
        set: DifferenceSet::new(),
    };

    // Matches created while resolving references are not visited.
    let ids: Vec<MatchId> = builder.mapping.iter().map(|m| m.id()).collect();
    monitor.begin_task("differencing", Some(ids.len()));
    for id in ids {
        if monitor.is_cancelled() {
            monitor.done();
            return Err(DiffError::Cancelled);
        }
        builder.visit(id)?;
        monitor.worked(1);
    }
    monitor.done();

    let set = builder.set;
    debug!(
        diff_policy = policies.diff.name(),
        differences = set.len(),
        no_containment = set.no_containment_count(),
        completed = Role::ALL
            .into_iter()
            .map(|r| builder.mapping.completed_matches(r).len())
            .sum::<usize>(),
        "differences computed"
    );
    Ok(set)
}

struct RoleScopes<'s, E: ScopeElement> {
    target: &'s dyn TreeDataScope<Element = E>,
    reference: &'s dyn TreeDataScope<Element = E>,
    ancestor: Option<&'s dyn TreeDataScope<Element = E>>,
}

impl<'s, E: ScopeElement> RoleScopes<'s, E> {
    fn get(&self, role: Role) -> Option<&'s dyn TreeDataScope<Element = E>> {
        match role {
            Role::Target => Some(self.target),
            Role::Reference => Some(self.reference),
            Role::Ancestor => self.ancestor,
        }
    }
}

struct Builder<'s, 'm, 'p, E: ScopeElement> {
    scopes: RoleScopes<'s, E>,
    mapping: &'m mut Mapping<E>,
    policies: DiffPolicies<'p, E>,
    options: DiffOptions,
    set: DifferenceSet<E>,
}

/// A feature's values on both sides and, in three-way mode, the ancestor.
struct Sides<K> {
    target: Vec<K>,
    reference: Vec<K>,
    ancestor: Option<Vec<K>>,
}

impl<K> Sides<K> {
    fn of(&self, role: Role) -> &[K] {
        match role {
            Role::Target => &self.target,
            Role::Reference => &self.reference,
            Role::Ancestor => self.ancestor.as_deref().unwrap_or(&[]),
        }
    }
}

impl<'s, 'm, 'p, E: ScopeElement> Builder<'s, 'm, 'p, E> {
    fn three_way(&self) -> bool {
        self.scopes.ancestor.is_some()
    }

    fn visit(&mut self, id: MatchId) -> DiffResult<()> {
        let Some(m) = self.mapping.get(id) else {
            return Ok(());
        };
        if m.is_removed() || m.is_completed() {
            return Ok(());
        }
        if let Some(role) = m.presence_role() {
            let owner = m.container(role);
            let element = m.element(role).cloned();
            let ancestor = m.element(Role::Ancestor).cloned();
            let diff = self
                .set
                .push(id, role, DifferenceKind::ElementPresence { owner });
            if self.three_way() {
                // The opposite side deleted an element the ancestor had.
                let aligned = ancestor.is_some();
                let conflicting = match (element, ancestor) {
                    (Some(e), Some(a)) => self.changed_since_ancestor(&e, role, &a)?,
                    _ => false,
                };
                self.set.classify(diff, aligned, conflicting);
            }
            return Ok(());
        }
        if !m.is_complete() {
            return Ok(());
        }

        let target = m.element(Role::Target).cloned();
        let reference = m.element(Role::Reference).cloned();
        let ancestor = m.element(Role::Ancestor).cloned();
        let (Some(t), Some(r)) = (target, reference) else {
            return Ok(());
        };

        for feature in self.features(&t, &r) {
            if !self
                .policies
                .diff
                .covers_feature(&feature, Role::Target, Role::Reference)?
            {
                continue;
            }
            match feature.kind {
                FeatureKind::Attribute => {
                    self.attribute_differences(id, &feature, &t, &r, ancestor.as_ref())
                }
                FeatureKind::Reference => {
                    self.reference_differences(id, &feature, &t, &r, ancestor.as_ref())?
                }
            }
        }
        Ok(())
    }

    /// Features of both elements, TARGET's declaration order first.
    fn features(&self, t: &E, r: &E) -> Vec<Feature> {
        let mut features = self.scopes.target.features(t);
        for f in self.scopes.reference.features(r) {
            if !features.iter().any(|g| g.name == f.name && g.kind == f.kind) {
                features.push(f);
            }
        }
        features
    }

    // ---------------------------------------------------------------
    // Attribute values
    // ---------------------------------------------------------------

    fn attribute_differences(
        &mut self,
        id: MatchId,
        feature: &Feature,
        t: &E,
        r: &E,
        a: Option<&E>,
    ) {
        let sides = Sides {
            target: self.scopes.target.attribute_values(t, feature),
            reference: self.scopes.reference.attribute_values(r, feature),
            ancestor: self.ancestor_attributes(a, feature),
        };
        let make = |value: &AttributeValue, is_order: bool| DifferenceKind::AttributeValue {
            feature: feature.clone(),
            value: value.clone(),
            is_order,
        };
        self.emit(id, feature, &sides, &sides, make);
    }

    fn ancestor_attributes(
        &self,
        a: Option<&E>,
        feature: &Feature,
    ) -> Option<Vec<AttributeValue>> {
        let scope = self.scopes.ancestor?;
        Some(a.map(|a| scope.attribute_values(a, feature)).unwrap_or_default())
    }

    // ---------------------------------------------------------------
    // Reference values
    // ---------------------------------------------------------------

    fn reference_differences(
        &mut self,
        id: MatchId,
        feature: &Feature,
        t: &E,
        r: &E,
        a: Option<&E>,
    ) -> DiffResult<()> {
        let resolved = Sides {
            target: self.resolve(t, feature, Role::Target)?,
            reference: self.resolve(r, feature, Role::Reference)?,
            ancestor: match self.scopes.ancestor {
                Some(_) => Some(match a {
                    Some(a) => self.resolve(a, feature, Role::Ancestor)?,
                    None => Vec::new(),
                }),
                None => None,
            },
        };
        let keys = Sides {
            target: resolved.target.iter().map(|(_, m)| *m).collect(),
            reference: resolved.reference.iter().map(|(_, m)| *m).collect(),
            ancestor: resolved
                .ancestor
                .as_ref()
                .map(|v| v.iter().map(|(_, m)| *m).collect()),
        };
        let make = |value: &(E, MatchId), is_order: bool| DifferenceKind::ReferenceValue {
            feature: feature.clone(),
            value: value.0.clone(),
            value_match: value.1,
            is_order,
        };
        self.emit(id, feature, &keys, &resolved, make);
        Ok(())
    }

    /// Targets of `feature` on `holder`, paired with their matches.
    /// Ignored and unresolvable references are dropped.
    fn resolve(
        &mut self,
        holder: &E,
        feature: &Feature,
        role: Role,
    ) -> DiffResult<Vec<(E, MatchId)>> {
        let Some(scope) = self.scopes.get(role) else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for target in scope.reference_values(holder, feature) {
            if self
                .policies
                .diff
                .ignores_reference(holder, feature, &target, role, scope)?
            {
                continue;
            }
            let id = match self.mapping.match_for(&target, role) {
                Some(id) => id,
                None if self.options.complete_references => {
                    // A keyless completed match could never pair across roles.
                    let key = self.policies.matching.match_key(&target, role, scope)?;
                    let Some(key) = key else {
                        debug!(%role, feature = %feature, "skipped reference to unkeyed element");
                        continue;
                    };
                    self.mapping.map(target.clone(), role, Some(key))
                }
                None => continue,
            };
            result.push((target, id));
        }
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Emission
    // ---------------------------------------------------------------

    /// Compare `keys` per role and emit presences carrying the matching
    /// entries of `values`.
    fn emit<K, V>(
        &mut self,
        id: MatchId,
        feature: &Feature,
        keys: &Sides<K>,
        values: &Sides<V>,
        make: impl Fn(&V, bool) -> DifferenceKind<E>,
    ) where
        K: Eq + Hash + Ord + Clone,
    {
        let only = [
            (Role::Target, surplus(keys.of(Role::Target), keys.of(Role::Reference))),
            (Role::Reference, surplus(keys.of(Role::Reference), keys.of(Role::Target))),
        ];

        if only.iter().all(|(_, s)| s.is_empty()) {
            if !self.options.detect_order
                || !self.policies.diff.is_ordered(feature)
                || keys.target == keys.reference
            {
                return;
            }
            let Some((ti, ri)) = first_out_of_place(&keys.target, &keys.reference) else {
                return;
            };
            let mut created = Vec::new();
            for (role, index) in [(Role::Target, ti), (Role::Reference, ri)] {
                let Some(value) = values.of(role).get(index) else {
                    continue;
                };
                let diff = self.set.push(id, role, make(value, true));
                if let Some(ancestor) = &keys.ancestor {
                    let aligned = keys.of(role) == ancestor.as_slice();
                    let conflicting = keys.target != *ancestor && keys.reference != *ancestor;
                    self.set.classify(diff, aligned, conflicting);
                }
                created.push(diff);
            }
            if let [a, b] = created[..] {
                self.set.link(a, b);
            }
            return;
        }

        let mut created: Vec<DifferenceId> = Vec::new();
        for (role, indices) in &only {
            for &index in indices {
                let Some(value) = values.of(*role).get(index) else {
                    continue;
                };
                let diff = self.set.push(id, *role, make(value, false));
                if let Some(ancestor) = &keys.ancestor {
                    let key = &keys.of(*role)[index];
                    let aligned = count(keys.of(*role), key) == count(ancestor, key);
                    let conflicting = !feature.many
                        && keys.target != *ancestor
                        && keys.reference != *ancestor;
                    self.set.classify(diff, aligned, conflicting);
                }
                created.push(diff);
            }
        }
        if !feature.many {
            if let [a, b] = created[..] {
                self.set.link(a, b);
            }
        }
    }

    // ---------------------------------------------------------------
    // Three-way helpers
    // ---------------------------------------------------------------

    /// Whether `element` (in `role`) differs from its ancestor `a` on any
    /// covered feature.
    fn changed_since_ancestor(&mut self, element: &E, role: Role, a: &E) -> DiffResult<bool> {
        let (Some(scope), Some(ancestor)) = (self.scopes.get(role), self.scopes.ancestor) else {
            return Ok(false);
        };
        for feature in scope.features(element) {
            if !self
                .policies
                .diff
                .covers_feature(&feature, role, Role::Ancestor)?
            {
                continue;
            }
            let changed = match feature.kind {
                FeatureKind::Attribute => {
                    scope.attribute_values(element, &feature)
                        != ancestor.attribute_values(a, &feature)
                }
                FeatureKind::Reference => {
                    let mine = self.resolve(element, &feature, role)?;
                    let theirs = self.resolve(a, &feature, Role::Ancestor)?;
                    !mine.iter().map(|(_, m)| m).eq(theirs.iter().map(|(_, m)| m))
                }
            };
            if changed {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Indices of `mine` whose values exceed their multiplicity in `theirs`.
fn surplus<K: Eq + Hash>(mine: &[K], theirs: &[K]) -> Vec<usize> {
    let mut remaining: HashMap<&K, usize> = HashMap::new();
    for k in theirs {
        *remaining.entry(k).or_default() += 1;
    }
    let mut result = Vec::new();
    for (i, k) in mine.iter().enumerate() {
        match remaining.get_mut(k) {
            Some(n) if *n > 0 => *n -= 1,
            _ => result.push(i),
        }
    }
    result
}

fn count<K: Eq>(values: &[K], key: &K) -> usize {
    values.iter().filter(|v| *v == key).count()
}

/// First value of each sequence lying outside their longest common
/// subsequence.
fn first_out_of_place<K: Eq + Hash + Ord>(left: &[K], right: &[K]) -> Option<(usize, usize)> {
    let ops = capture_diff_slices(Algorithm::Myers, left, right);
    let mut first_left = None;
    let mut first_right = None;
    for op in &ops {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        if first_left.is_none() && !old.is_empty() {
            first_left = Some(old.start);
        }
        if first_right.is_none() && !new.is_empty() {
            first_right = Some(new.start);
        }
    }
    Some((first_left?, first_right?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_match::{build_mapping, AttributeMatchPolicy, IdentityMatchPolicy, PathMatchPolicy};
    use arbor_scope::{EditableTreeDataScope, ElementId, MemoryScope, Schema};
    use arbor_types::{NullProgress, RoleMap};

    use crate::difference::DifferenceCategory;
    use crate::policy::{DefaultDiffPolicy, FeatureFilterDiffPolicy};

    fn schema() -> Schema {
        Schema::new()
            .with_kind("Pkg", vec![Feature::attribute("name")])
            .with_kind(
                "Cls",
                vec![
                    Feature::attribute("name"),
                    Feature::attribute("tags").many(false),
                    Feature::attribute("params").many(true),
                    Feature::reference("super"),
                    Feature::reference("uses").many(true),
                ],
            )
    }

    fn set_of<'a>(
        t: &'a MemoryScope,
        r: &'a MemoryScope,
        a: Option<&'a MemoryScope>,
    ) -> ScopeSet<'a, ElementId> {
        RoleMap::new(
            Some(t as &dyn TreeDataScope<Element = ElementId>),
            Some(r as &dyn TreeDataScope<Element = ElementId>),
            a.map(|s| s as &dyn TreeDataScope<Element = ElementId>),
        )
    }

    fn diff_with(
        t: &MemoryScope,
        r: &MemoryScope,
        a: Option<&MemoryScope>,
        matching: &dyn MatchPolicy<ElementId>,
        diff: &dyn DiffPolicy<ElementId>,
    ) -> (Mapping<ElementId>, DifferenceSet<ElementId>) {
        let scopes = set_of(t, r, a);
        let mut mapping = build_mapping(&scopes, matching, &NullProgress).unwrap();
        let set = compute_differences(
            &scopes,
            &mut mapping,
            DiffPolicies { diff, matching },
            &DiffOptions::default(),
            &NullProgress,
        )
        .unwrap();
        (mapping, set)
    }

    fn diff(t: &MemoryScope, r: &MemoryScope) -> DifferenceSet<ElementId> {
        diff_with(t, r, None, &PathMatchPolicy, &DefaultDiffPolicy).1
    }

    /// TARGET: A/B(name=x); REFERENCE: A/B(name=y), A/C.
    fn example() -> (MemoryScope, MemoryScope) {
        let mut t = MemoryScope::new("t", schema());
        let a = t.add_root("Pkg");
        let b = t.add_child_of(a, "Cls").unwrap();
        t.set_attr(b, "name", ["x"]).unwrap();

        let mut r = t.clone().relabel("r");
        r.set_attr(b, "name", ["y"]).unwrap();
        r.add_child_of(a, "Cls").unwrap();
        (t, r)
    }

    #[test]
    fn identical_scopes_have_no_differences() {
        let (t, _) = example();
        let set = diff(&t, &t.clone());
        assert!(set.is_empty());
    }

    #[test]
    fn two_way_example() {
        let (t, r) = example();
        let set = diff(&t, &r);
        assert_eq!(set.len(), 3);
        assert_eq!(set.no_containment_count(), 2);

        let values: Vec<_> = set
            .iter()
            .filter_map(|d| match d.kind() {
                DifferenceKind::AttributeValue { value, .. } => {
                    Some((d.presence_role(), value.clone()))
                }
                _ => None,
            })
            .collect();
        assert!(values.contains(&(Role::Target, "x".into())));
        assert!(values.contains(&(Role::Reference, "y".into())));

        let presence = set.iter().find(|d| d.is_element_presence()).unwrap();
        assert_eq!(presence.presence_role(), Role::Reference);
        assert!(presence.owner().is_some());
    }

    #[test]
    fn single_valued_presences_are_linked() {
        let (t, r) = example();
        let set = diff(&t, &r);
        let ids: Vec<_> = set
            .iter()
            .filter(|d| d.category() == DifferenceCategory::AttributeValue)
            .map(|d| d.id())
            .collect();
        assert_eq!(set.counterpart(ids[0]), Some(ids[1]));
    }

    #[test]
    fn multi_valued_attributes_compare_as_multisets() {
        let mut t = MemoryScope::new("t", schema());
        let c = t.add_root("Cls");
        t.set_attr(c, "tags", ["a", "b", "b"]).unwrap();
        let mut r = t.clone();
        r.set_attr(c, "tags", ["b", "a", "c"]).unwrap();

        let set = diff(&t, &r);
        let found: Vec<_> = set
            .iter()
            .map(|d| match d.kind() {
                DifferenceKind::AttributeValue { value, is_order, .. } => {
                    (d.presence_role(), value.clone(), *is_order)
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            found,
            vec![
                (Role::Target, "b".into(), false),
                (Role::Reference, "c".into(), false),
            ]
        );
        assert_eq!(set.counterpart(set.live_ids()[0]), None);
    }

    #[test]
    fn reordering_an_ordered_feature_yields_order_differences() {
        let mut t = MemoryScope::new("t", schema());
        let c = t.add_root("Cls");
        t.set_attr(c, "params", ["p", "q", "r"]).unwrap();
        let mut r = t.clone();
        r.set_attr(c, "params", ["q", "p", "r"]).unwrap();

        let set = diff(&t, &r);
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|d| d.is_order()));
        let ids = set.live_ids();
        assert_eq!(set.counterpart(ids[0]), Some(ids[1]));

        let unordered = FeatureFilterDiffPolicy::new().unordered("params");
        let (_, set) = diff_with(&t, &r, None, &PathMatchPolicy, &unordered);
        assert!(set.is_empty());
    }

    #[test]
    fn ignored_features_are_skipped() {
        let (t, r) = example();
        let policy = FeatureFilterDiffPolicy::new().ignore_feature("name");
        let (_, set) = diff_with(&t, &r, None, &PathMatchPolicy, &policy);
        assert_eq!(set.len(), 1);
        assert_eq!(set.no_containment_count(), 0);
    }

    #[test]
    fn reference_values_are_compared_by_match() {
        let mut t = MemoryScope::new("t", schema());
        let pkg = t.add_root("Pkg");
        let a = t.add_child_of(pkg, "Cls").unwrap();
        let b = t.add_child_of(pkg, "Cls").unwrap();
        let c = t.add_child_of(pkg, "Cls").unwrap();
        t.set_refs(c, "super", [a]).unwrap();
        let mut r = t.clone();
        r.set_refs(c, "super", [b]).unwrap();

        let (mapping, set) = diff_with(&t, &r, None, &PathMatchPolicy, &DefaultDiffPolicy);
        assert_eq!(set.len(), 2);
        let to_b = set
            .in_role(Role::Reference)
            .find_map(|d| d.value_match())
            .unwrap();
        assert_eq!(mapping.match_for(&b, Role::Reference), Some(to_b));
    }

    #[test]
    fn references_outside_content_get_completed_matches() {
        let mut t = MemoryScope::new("t", schema());
        let c = t.add_root("Cls");
        let lib = t.add_detached("Cls");
        t.set_refs(c, "super", [lib]).unwrap();
        let r = t.clone();

        let (mapping, set) = diff_with(&t, &r, None, &IdentityMatchPolicy, &DefaultDiffPolicy);
        assert!(set.is_empty());
        let completed = mapping.completed_matches(Role::Target);
        assert_eq!(completed.len(), 1);
        assert_eq!(mapping.completed_matches(Role::Reference), completed);

        let filter = FeatureFilterDiffPolicy::new().ignore_references_outside_content(true);
        let (mapping, _) = diff_with(&t, &r, None, &IdentityMatchPolicy, &filter);
        assert!(mapping.completed_matches(Role::Target).is_empty());
    }

    #[test]
    fn references_to_unkeyed_elements_are_not_compared() {
        let mut t = MemoryScope::new("t", schema());
        let c = t.add_root("Cls");
        t.set_attr(c, "name", ["c"]).unwrap();
        let lib = t.add_detached("Cls");
        t.set_refs(c, "super", [lib]).unwrap();
        let r = t.clone().relabel("r");

        let by_name = AttributeMatchPolicy::new("name").without_fallback();
        let (mapping, set) = diff_with(&t, &r, None, &by_name, &DefaultDiffPolicy);
        assert!(set.is_empty());
        assert!(mapping.completed_matches(Role::Target).is_empty());
        assert_eq!(mapping.match_for(&lib, Role::Reference), None);
    }

    #[test]
    fn three_way_classifies_changes() {
        let schema = schema();
        let mut o = MemoryScope::new("o", schema);
        let c = o.add_root("Cls");
        o.set_attr(c, "name", ["x"]).unwrap();
        let t = o.clone();
        let mut r = o.clone();
        r.set_attr(c, "name", ["y"]).unwrap();

        let (_, set) = diff_with(&t, &r, Some(&o), &PathMatchPolicy, &DefaultDiffPolicy);
        assert_eq!(set.len(), 2);
        let target = set.in_role(Role::Target).next().unwrap();
        let reference = set.in_role(Role::Reference).next().unwrap();
        assert!(target.is_aligned_with_ancestor());
        assert!(!reference.is_aligned_with_ancestor());
        assert!(!target.is_conflicting() && !reference.is_conflicting());
    }

    #[test]
    fn three_way_detects_conflicts() {
        let mut o = MemoryScope::new("o", schema());
        let c = o.add_root("Cls");
        o.set_attr(c, "name", ["x"]).unwrap();
        let mut t = o.clone();
        t.set_attr(c, "name", ["t"]).unwrap();
        let mut r = o.clone();
        r.set_attr(c, "name", ["r"]).unwrap();

        let (_, set) = diff_with(&t, &r, Some(&o), &PathMatchPolicy, &DefaultDiffPolicy);
        assert_eq!(set.summary().conflicting, 2);
    }

    #[test]
    fn deletion_of_changed_element_conflicts() {
        let mut o = MemoryScope::new("o", schema());
        let pkg = o.add_root("Pkg");
        let c = o.add_child_of(pkg, "Cls").unwrap();
        o.set_attr(c, "name", ["c"]).unwrap();
        let mut t = o.clone();
        t.set_attr(c, "name", ["changed"]).unwrap();
        let mut r = o.clone();
        r.remove_element(&c).unwrap();

        let (_, set) = diff_with(&t, &r, Some(&o), &IdentityMatchPolicy, &DefaultDiffPolicy);
        let presence = set.iter().find(|d| d.is_element_presence()).unwrap();
        assert_eq!(presence.presence_role(), Role::Target);
        assert!(presence.is_aligned_with_ancestor());
        assert!(presence.is_conflicting());
    }

    #[test]
    fn surplus_respects_multiplicity() {
        assert_eq!(surplus(&[1, 2, 2, 3], &[2, 3, 4]), vec![0, 2]);
        assert!(surplus::<u8>(&[], &[1]).is_empty());
    }

    #[test]
    fn first_out_of_place_finds_moved_value() {
        let (left, right) = first_out_of_place(&[1, 2, 3], &[2, 1, 3]).unwrap();
        assert!(left < 2 && right < 2);
        assert_eq!(first_out_of_place(&[1, 2], &[1, 2]), None);
    }
}
