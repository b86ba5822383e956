//! The matching engine: builds a [`Mapping`] from up to three scopes.
//!
//! Matching runs in two passes:
//!
//! 1. Every role's content is traversed depth-first, roots first, in role
//!    order (TARGET, REFERENCE, ANCESTOR). Each element's key is computed
//!    by the policy and registered in the mapping.
//! 2. Once every match exists, the container of each match is resolved
//!    per role through the mapping.

use arbor_scope::{ScopeElement, TreeDataScope};
use arbor_types::{ProgressMonitor, Role, RoleMap};
use tracing::{debug, warn};

use crate::error::{MatchError, MatchResult};
use crate::mapping::Mapping;
use crate::policy::MatchPolicy;

/// The scopes taking part in a comparison, one slot per role.
pub type ScopeSet<'a, E> = RoleMap<Option<&'a dyn TreeDataScope<Element = E>>>;

/// Match the contents of `scopes` with `policy`.
///
/// TARGET and REFERENCE are required; ANCESTOR is optional. Cancellation is
/// polled once per element visited; a cancelled or failed run returns an
/// error and no partial mapping.
pub fn build_mapping<E: ScopeElement>(
    scopes: &ScopeSet<'_, E>,
    policy: &dyn MatchPolicy<E>,
    monitor: &dyn ProgressMonitor,
) -> MatchResult<Mapping<E>> {
    for role in Role::SIDES {
        if scopes.get(role).is_none() {
            return Err(MatchError::MissingScope(role));
        }
    }

    let contents: RoleMap<Vec<E>> =
        RoleMap::from_fn(|role| scopes.get(role).map(|s| s.all_contents()).unwrap_or_default());
    let total = Role::ALL.into_iter().map(|r| contents.get(r).len()).sum();
    monitor.begin_task("matching", Some(total));

    let mut mapping = Mapping::new();
    let mut excluded = 0usize;

    for (role, scope) in scopes.iter() {
        let Some(scope) = scope else { continue };
        for element in contents.get(role) {
            if monitor.is_cancelled() {
                monitor.done();
                return Err(MatchError::Cancelled);
            }
            match policy.match_key(element, role, *scope)? {
                Some(key) => {
                    mapping.register(element.clone(), role, Some(key));
                }
                None => excluded += 1,
            }
            monitor.worked(1);
        }
    }

    for (role, scope) in scopes.iter() {
        let Some(scope) = scope else { continue };
        for element in contents.get(role) {
            let Some(id) = mapping.match_for(element, role) else {
                continue;
            };
            let container = scope
                .container(element)
                .and_then(|parent| mapping.match_for(&parent, role));
            mapping.set_container(id, role, container);
        }
    }

    for role in Role::ALL {
        let duplicates = mapping.duplicate_keys(role);
        if !duplicates.is_empty() {
            warn!(%role, count = duplicates.len(), "duplicate match keys");
        }
    }
    debug!(
        policy = policy.name(),
        matches = mapping.len(),
        excluded,
        consistent = mapping.is_consistent(),
        "matching complete"
    );
    monitor.done();
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_scope::{ElementId, MemoryScope, Schema};
    use arbor_types::{CancellationToken, Feature, MatchKey, NullProgress, PolicyError};

    use crate::policy::{AttributeMatchPolicy, FnMatchPolicy, PathMatchPolicy};

    fn schema() -> Schema {
        Schema::new()
            .with_kind("Pkg", vec![Feature::attribute("id")])
            .with_kind("Cls", vec![Feature::attribute("id")])
    }

    /// Pkg(A) with children B and C.
    fn tree(label: &str) -> (MemoryScope, ElementId, ElementId, ElementId) {
        let mut s = MemoryScope::new(label, schema());
        let a = s.add_root("Pkg");
        let b = s.add_child_of(a, "Cls").unwrap();
        let c = s.add_child_of(a, "Cls").unwrap();
        s.set_attr(a, "id", ["A"]).unwrap();
        s.set_attr(b, "id", ["B"]).unwrap();
        s.set_attr(c, "id", ["C"]).unwrap();
        (s, a, b, c)
    }

    fn scopes<'a>(
        target: &'a MemoryScope,
        reference: &'a MemoryScope,
        ancestor: Option<&'a MemoryScope>,
    ) -> ScopeSet<'a, ElementId> {
        RoleMap::new(
            Some(target as &dyn TreeDataScope<Element = ElementId>),
            Some(reference as &dyn TreeDataScope<Element = ElementId>),
            ancestor.map(|s| s as &dyn TreeDataScope<Element = ElementId>),
        )
    }

    #[test]
    fn identical_trees_match_pairwise() {
        let (t, a, b, c) = tree("t");
        let r = t.clone().relabel("r");
        let mapping = build_mapping(&scopes(&t, &r, None), &PathMatchPolicy, &NullProgress).unwrap();

        assert_eq!(mapping.len(), 3);
        assert!(mapping.is_consistent());
        for e in [a, b, c] {
            let id = mapping.match_for(&e, Role::Target).unwrap();
            assert_eq!(mapping.match_for(&e, Role::Reference), Some(id));
            assert!(mapping.get(id).unwrap().is_complete());
        }
    }

    #[test]
    fn containers_are_resolved_per_role() {
        let (t, a, b, _) = tree("t");
        let r = t.clone();
        let mapping = build_mapping(&scopes(&t, &r, None), &PathMatchPolicy, &NullProgress).unwrap();
        let root = mapping.match_for(&a, Role::Target).unwrap();
        let child = mapping.match_for(&b, Role::Target).unwrap();
        let m = mapping.get(child).unwrap();
        assert_eq!(m.container(Role::Target), Some(root));
        assert_eq!(m.container(Role::Reference), Some(root));
        assert_eq!(mapping.get(root).unwrap().owner(), None);
    }

    #[test]
    fn unmatched_elements_get_one_sided_matches() {
        let (t, ..) = tree("t");
        let (mut r, ra, ..) = tree("r");
        let d = r.add_child_of(ra, "Cls").unwrap();
        r.set_attr(d, "id", ["D"]).unwrap();

        let policy = AttributeMatchPolicy::new("id");
        let mapping = build_mapping(&scopes(&t, &r, None), &policy, &NullProgress).unwrap();
        let id = mapping.match_for(&d, Role::Reference).unwrap();
        assert_eq!(mapping.get(id).unwrap().presence_role(), Some(Role::Reference));
        assert_eq!(mapping.len(), 4);
    }

    #[test]
    fn ancestor_joins_side_matches() {
        let (t, _, b, _) = tree("t");
        let r = t.clone();
        let o = t.clone();
        let mapping =
            build_mapping(&scopes(&t, &r, Some(&o)), &PathMatchPolicy, &NullProgress).unwrap();
        let id = mapping.match_for(&b, Role::Target).unwrap();
        assert_eq!(mapping.get(id).unwrap().roles(), Role::ALL.to_vec());
    }

    #[test]
    fn duplicate_keys_make_mapping_inconsistent() {
        let (mut t, ..) = tree("t");
        let (r, ..) = tree("r");
        let extra = t.add_root("Pkg");
        t.set_attr(extra, "id", ["B"]).unwrap();

        let policy = AttributeMatchPolicy::new("id");
        let mapping = build_mapping(&scopes(&t, &r, None), &policy, &NullProgress).unwrap();
        assert!(!mapping.is_consistent());
        assert_eq!(mapping.duplicate_keys(Role::Target), &[MatchKey::from("B")]);
        let dup = mapping.match_for(&extra, Role::Target).unwrap();
        assert!(!mapping.get(dup).unwrap().has(Role::Reference));
    }

    #[test]
    fn excluded_elements_have_no_match() {
        let (t, a, b, _) = tree("t");
        let r = t.clone();
        let policy = FnMatchPolicy::new(
            "skip-b",
            move |e: &ElementId,
                  _: Role,
                  _: &dyn TreeDataScope<Element = ElementId>|
                  -> Result<Option<MatchKey>, PolicyError> {
                Ok((*e != b).then(|| MatchKey::from(e.as_u64())))
            },
        );
        let mapping = build_mapping(&scopes(&t, &r, None), &policy, &NullProgress).unwrap();
        assert_eq!(mapping.match_for(&b, Role::Target), None);
        assert!(mapping.match_for(&a, Role::Target).is_some());
    }

    #[test]
    fn policy_error_aborts() {
        let (t, ..) = tree("t");
        let r = t.clone();
        let policy = FnMatchPolicy::new(
            "broken",
            |_: &ElementId,
             _: Role,
             _: &dyn TreeDataScope<Element = ElementId>|
             -> Result<Option<MatchKey>, PolicyError> { Err(PolicyError::new("broken", "boom")) },
        );
        let err = build_mapping(&scopes(&t, &r, None), &policy, &NullProgress).unwrap_err();
        assert!(matches!(err, MatchError::Policy(_)));
    }

    #[test]
    fn cancellation_is_honoured() {
        let (t, ..) = tree("t");
        let r = t.clone();
        let token = CancellationToken::new();
        token.cancel();
        let err = build_mapping(&scopes(&t, &r, None), &PathMatchPolicy, &token).unwrap_err();
        assert!(matches!(err, MatchError::Cancelled));
    }

    #[test]
    fn missing_side_scope_is_rejected() {
        let (t, ..) = tree("t");
        let set: ScopeSet<'_, ElementId> = RoleMap::new(
            Some(&t as &dyn TreeDataScope<Element = ElementId>),
            None,
            None,
        );
        let err = build_mapping(&set, &PathMatchPolicy, &NullProgress).unwrap_err();
        assert!(matches!(err, MatchError::MissingScope(Role::Reference)));
    }
}
