//! The arena of differences owned by one comparison.
//!
//! Differences are appended once and never removed from the arena; merging
//! only retires them from the live set. Retired ids stay valid for lookups.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use arbor_types::{DifferenceId, MatchId, Role};

use crate::difference::{Difference, DifferenceCategory, DifferenceKind};

/// Counts over the live differences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total: usize,
    pub no_containment: usize,
    pub element_presences: usize,
    pub attribute_values: usize,
    pub reference_values: usize,
    pub order: usize,
    pub conflicting: usize,
}

/// All differences of a comparison plus the live subset.
#[derive(Clone, Debug)]
pub struct DifferenceSet<E> {
    all: Vec<Difference<E>>,
    live: BTreeSet<DifferenceId>,
    by_match: HashMap<MatchId, Vec<DifferenceId>>,
    counterparts: HashMap<DifferenceId, DifferenceId>,
}

impl<E> Default for DifferenceSet<E> {
    fn default() -> Self {
        Self {
            all: Vec::new(),
            live: BTreeSet::new(),
            by_match: HashMap::new(),
            counterparts: HashMap::new(),
        }
    }
}

impl<E> DifferenceSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a difference; it starts live.
    pub fn push(
        &mut self,
        element_match: MatchId,
        role: Role,
        kind: DifferenceKind<E>,
    ) -> DifferenceId {
        let id = DifferenceId::from_index(self.all.len());
        self.all.push(Difference {
            id,
            element_match,
            role,
            aligned_with_ancestor: false,
            conflicting: false,
            kind,
        });
        self.live.insert(id);
        self.by_match.entry(element_match).or_default().push(id);
        id
    }

    /// Record three-way classification of a difference.
    pub fn classify(&mut self, id: DifferenceId, aligned_with_ancestor: bool, conflicting: bool) {
        if let Some(d) = self.all.get_mut(id.index()) {
            d.aligned_with_ancestor = aligned_with_ancestor;
            d.conflicting = conflicting;
        }
    }

    /// Pair two symmetric differences: retiring one by merge retires the other.
    pub fn link(&mut self, a: DifferenceId, b: DifferenceId) {
        self.counterparts.insert(a, b);
        self.counterparts.insert(b, a);
    }

    /// The symmetric counterpart of `id`, live or not.
    pub fn counterpart(&self, id: DifferenceId) -> Option<DifferenceId> {
        self.counterparts.get(&id).copied()
    }

    /// Look up any difference, live or retired.
    pub fn get(&self, id: DifferenceId) -> Option<&Difference<E>> {
        self.all.get(id.index())
    }

    pub fn is_live(&self, id: DifferenceId) -> bool {
        self.live.contains(&id)
    }

    /// Remove `id` from the live set. Returns `true` if it was live.
    pub fn retire(&mut self, id: DifferenceId) -> bool {
        self.live.remove(&id)
    }

    /// Number of live differences.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of differences ever created, retired ones included.
    pub fn created(&self) -> usize {
        self.all.len()
    }

    /// Live differences in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Difference<E>> {
        self.live.iter().filter_map(|id| self.all.get(id.index()))
    }

    /// Ids of the live differences in creation order.
    pub fn live_ids(&self) -> Vec<DifferenceId> {
        self.live.iter().copied().collect()
    }

    /// Live differences whose presence role is `role`.
    pub fn in_role(&self, role: Role) -> impl Iterator<Item = &Difference<E>> {
        self.iter().filter(move |d| d.role == role)
    }

    /// Live differences about match `id`.
    pub fn for_match(&self, id: MatchId) -> impl Iterator<Item = &Difference<E>> {
        self.by_match
            .get(&id)
            .into_iter()
            .flatten()
            .filter(|d| self.live.contains(*d))
            .filter_map(|d| self.all.get(d.index()))
    }

    /// The live element presence of match `id`, if any.
    pub fn presence_of(&self, id: MatchId) -> Option<&Difference<E>> {
        self.for_match(id).find(|d| d.is_element_presence())
    }

    /// Live attribute and reference value presences.
    pub fn no_containment_count(&self) -> usize {
        self.iter().filter(|d| d.is_value_presence()).count()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for d in self.iter() {
            summary.total += 1;
            match d.category() {
                DifferenceCategory::ElementPresence => summary.element_presences += 1,
                DifferenceCategory::AttributeValue => summary.attribute_values += 1,
                DifferenceCategory::ReferenceValue => summary.reference_values += 1,
            }
            if d.is_value_presence() {
                summary.no_containment += 1;
            }
            if d.is_order() {
                summary.order += 1;
            }
            if d.conflicting {
                summary.conflicting += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Feature;

    fn value(v: &str) -> DifferenceKind<u32> {
        DifferenceKind::AttributeValue {
            feature: Feature::attribute("name"),
            value: v.into(),
            is_order: false,
        }
    }

    fn sample() -> (DifferenceSet<u32>, DifferenceId, DifferenceId, DifferenceId) {
        let mut set = DifferenceSet::new();
        let m = MatchId::from_index(1);
        let x = set.push(m, Role::Target, value("x"));
        let y = set.push(m, Role::Reference, value("y"));
        set.link(x, y);
        let c = set.push(
            MatchId::from_index(2),
            Role::Reference,
            DifferenceKind::ElementPresence {
                owner: Some(MatchId::from_index(0)),
            },
        );
        (set, x, y, c)
    }

    #[test]
    fn counts_distinguish_containment() {
        let (set, ..) = sample();
        assert_eq!(set.len(), 3);
        assert_eq!(set.no_containment_count(), 2);
        let summary = set.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.element_presences, 1);
        assert_eq!(summary.attribute_values, 2);
    }

    #[test]
    fn retire_keeps_lookup() {
        let (mut set, x, y, _) = sample();
        assert!(set.retire(x));
        assert!(!set.retire(x));
        assert!(!set.is_live(x));
        assert!(set.get(x).is_some());
        assert_eq!(set.counterpart(x), Some(y));
        assert_eq!(set.len(), 2);
        assert_eq!(set.created(), 3);
    }

    #[test]
    fn role_and_match_queries_skip_retired() {
        let (mut set, _, y, c) = sample();
        assert_eq!(set.in_role(Role::Reference).count(), 2);
        set.retire(y);
        assert_eq!(set.in_role(Role::Reference).count(), 1);
        assert_eq!(set.for_match(MatchId::from_index(1)).count(), 1);
        assert_eq!(set.presence_of(MatchId::from_index(2)).map(|d| d.id()), Some(c));
    }

    #[test]
    fn classify_updates_flags() {
        let (mut set, x, ..) = sample();
        set.classify(x, true, true);
        let d = set.get(x).unwrap();
        assert!(d.is_aligned_with_ancestor());
        assert!(d.is_conflicting());
        assert_eq!(set.summary().conflicting, 1);
    }
}
