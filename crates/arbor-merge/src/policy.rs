//! Merge policies and selectors.
//!
//! A [`MergePolicy`] orders the differences of a merge and settles
//! three-way conflicts when the caller merges everything at once. A
//! [`MergeSelector`] picks differences to merge and names their destination.

use std::cmp::Reverse;
use std::fmt;

use arbor_diff::{Difference, DifferenceSet};
use arbor_match::Mapping;
use arbor_scope::ScopeElement;
use arbor_types::{DifferenceId, MatchId, PolicyError, Role};

/// Decides merge order and conflict resolution.
pub trait MergePolicy<E: ScopeElement>: Send + Sync {
    fn name(&self) -> &str;

    /// Reorder `selected` in place. The default applies
    /// [`containment_order`].
    fn order(
        &self,
        selected: &mut Vec<DifferenceId>,
        differences: &DifferenceSet<E>,
        mapping: &Mapping<E>,
        destination: Role,
    ) -> Result<(), PolicyError> {
        containment_order(selected, differences, mapping, destination);
        Ok(())
    }

    /// Whether a conflicting difference should be merged into
    /// `destination` when no explicit selection was made. `None` leaves the
    /// conflict for the caller.
    fn resolve_conflict(&self, _difference: &Difference<E>, _destination: Role) -> Option<bool> {
        None
    }
}

/// Containment-respecting order, conflicts left for explicit selection.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMergePolicy;

impl<E: ScopeElement> MergePolicy<E> for DefaultMergePolicy {
    fn name(&self) -> &str {
        "default"
    }
}

/// Resolves every conflict in favour of one role.
#[derive(Clone, Copy, Debug)]
pub struct PreferRoleMergePolicy {
    winner: Role,
}

impl PreferRoleMergePolicy {
    pub fn new(winner: Role) -> Self {
        Self { winner }
    }

    pub fn winner(&self) -> Role {
        self.winner
    }
}

impl<E: ScopeElement> MergePolicy<E> for PreferRoleMergePolicy {
    fn name(&self) -> &str {
        "prefer-role"
    }

    fn resolve_conflict(&self, _difference: &Difference<E>, destination: Role) -> Option<bool> {
        // Merging either side of a conflict makes the destination take the
        // opposite state.
        Some(self.winner == destination.opposite())
    }
}

/// Sort `selected` so that dependencies are applied first:
///
/// 1. element additions, shallowest first
/// 2. value presences
/// 3. order differences
/// 4. element removals, deepest first
///
/// Ties keep creation order. Unknown ids sort last.
pub fn containment_order<E: ScopeElement>(
    selected: &mut [DifferenceId],
    differences: &DifferenceSet<E>,
    mapping: &Mapping<E>,
    destination: Role,
) {
    selected.sort_by_key(|id| {
        let Some(d) = differences.get(*id) else {
            return (4u8, Reverse(0usize), 0usize, *id);
        };
        let role = d.presence_role();
        if d.is_element_presence() {
            let depth = depth_of(mapping, d.element_match(), role);
            if role == destination {
                (3, Reverse(depth), 0, *id)
            } else {
                (0, Reverse(0), depth, *id)
            }
        } else if d.is_order() {
            (2, Reverse(0), 0, *id)
        } else {
            (1, Reverse(0), 0, *id)
        }
    });
}

/// Number of containers above match `id` in `role`.
pub fn depth_of<E: ScopeElement>(mapping: &Mapping<E>, id: MatchId, role: Role) -> usize {
    let mut depth = 0;
    let mut current = id;
    while let Some(parent) = mapping.get(current).and_then(|m| m.container(role)) {
        depth += 1;
        current = parent;
        if depth > mapping.len() {
            break;
        }
    }
    depth
}

/// Picks differences to merge and the role receiving them.
pub trait MergeSelector<E: ScopeElement> {
    fn destination(&self) -> Role;

    fn selects(&self, difference: &Difference<E>, mapping: &Mapping<E>) -> bool;
}

/// Selects every difference present in `source`, merging it into the
/// opposite role: the destination gains what the source has, and keeps
/// what only it has.
#[derive(Clone, Copy, Debug)]
pub struct RoleMergeSelector {
    source: Role,
}

impl RoleMergeSelector {
    pub fn new(source: Role) -> Self {
        Self { source }
    }
}

impl<E: ScopeElement> MergeSelector<E> for RoleMergeSelector {
    fn destination(&self) -> Role {
        self.source.opposite()
    }

    fn selects(&self, difference: &Difference<E>, _mapping: &Mapping<E>) -> bool {
        difference.presence_role() == self.source
    }
}

/// Adapter turning a predicate into a [`MergeSelector`].
pub struct FnMergeSelector<F> {
    destination: Role,
    f: F,
}

impl<F> FnMergeSelector<F> {
    pub fn new(destination: Role, f: F) -> Self {
        Self { destination, f }
    }
}

impl<F> fmt::Debug for FnMergeSelector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMergeSelector")
            .field("destination", &self.destination)
            .finish()
    }
}

impl<E, F> MergeSelector<E> for FnMergeSelector<F>
where
    E: ScopeElement,
    F: Fn(&Difference<E>, &Mapping<E>) -> bool,
{
    fn destination(&self) -> Role {
        self.destination
    }

    fn selects(&self, difference: &Difference<E>, mapping: &Mapping<E>) -> bool {
        (self.f)(difference, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_diff::DifferenceKind;
    use arbor_types::{Feature, MatchKey};

    /// m0 root, m1 child of m0, m2 child of m1; all TARGET only.
    fn chain() -> Mapping<u32> {
        let mut mapping = Mapping::new();
        for e in 0..3u32 {
            mapping.register(e, Role::Target, Some(MatchKey::from(u64::from(e))));
        }
        mapping.set_container(MatchId::from_index(1), Role::Target, Some(MatchId::from_index(0)));
        mapping.set_container(MatchId::from_index(2), Role::Target, Some(MatchId::from_index(1)));
        mapping
    }

    fn presence(set: &mut DifferenceSet<u32>, m: usize, role: Role) -> DifferenceId {
        set.push(
            MatchId::from_index(m),
            role,
            DifferenceKind::ElementPresence { owner: None },
        )
    }

    #[test]
    fn depth_follows_containers() {
        let mapping = chain();
        assert_eq!(depth_of(&mapping, MatchId::from_index(0), Role::Target), 0);
        assert_eq!(depth_of(&mapping, MatchId::from_index(2), Role::Target), 2);
        assert_eq!(depth_of(&mapping, MatchId::from_index(2), Role::Reference), 0);
    }

    #[test]
    fn additions_first_removals_last() {
        let mapping = chain();
        let mut set = DifferenceSet::new();
        let remove_leaf = presence(&mut set, 2, Role::Reference);
        let add_leaf = presence(&mut set, 2, Role::Target);
        let value = set.push(
            MatchId::from_index(0),
            Role::Target,
            DifferenceKind::AttributeValue {
                feature: Feature::attribute("name"),
                value: "x".into(),
                is_order: false,
            },
        );
        let add_root = presence(&mut set, 0, Role::Target);
        let remove_root = presence(&mut set, 0, Role::Reference);

        let mut order = vec![remove_root, remove_leaf, value, add_leaf, add_root];
        containment_order(&mut order, &set, &mapping, Role::Reference);
        assert_eq!(order[..2], [add_root, add_leaf]);
        assert_eq!(order[2], value);
        // Both removals are depth 0 in REFERENCE, so creation order holds.
        assert_eq!(order[3..], [remove_leaf, remove_root]);
    }

    #[test]
    fn prefer_role_resolves_towards_winner() {
        let mut set: DifferenceSet<u32> = DifferenceSet::new();
        let id = presence(&mut set, 0, Role::Reference);
        let d = set.get(id).unwrap();
        let prefer_reference = PreferRoleMergePolicy::new(Role::Reference);
        assert_eq!(prefer_reference.resolve_conflict(d, Role::Target), Some(true));
        assert_eq!(prefer_reference.resolve_conflict(d, Role::Reference), Some(false));
        assert_eq!(
            MergePolicy::<u32>::resolve_conflict(&DefaultMergePolicy, d, Role::Target),
            None
        );
    }

    #[test]
    fn selectors() {
        let mapping: Mapping<u32> = Mapping::new();
        let mut set: DifferenceSet<u32> = DifferenceSet::new();
        let r = presence(&mut set, 0, Role::Reference);
        let t = presence(&mut set, 1, Role::Target);

        let selector = RoleMergeSelector::new(Role::Reference);
        assert_eq!(MergeSelector::<u32>::destination(&selector), Role::Target);
        assert!(selector.selects(set.get(r).unwrap(), &mapping));
        assert!(!selector.selects(set.get(t).unwrap(), &mapping));

        let only_elements = FnMergeSelector::new(Role::Reference, |d: &Difference<u32>, _: &Mapping<u32>| {
            d.is_element_presence()
        });
        assert!(only_elements.selects(set.get(t).unwrap(), &mapping));
    }
}
