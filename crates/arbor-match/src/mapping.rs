//! The indexed collection of matches owned by one comparison.
//!
//! [`Mapping`] is an arena: matches live in a `Vec` and are referred to by
//! [`MatchId`] everywhere else. Two indices sit on top of it:
//!
//! - element index: `(role, element) -> MatchId`
//! - key index: `(role, key) -> MatchId` (representative elements only)
//!
//! # Invariants
//!
//! - Every registered element maps to exactly one match.
//! - A match holds at least one element, or is flagged removed.
//! - A key appears at most once per role in the key index; colliding
//!   elements are recorded as duplicates and get their own match.

use std::collections::HashMap;

use arbor_types::{MatchId, MatchKey, Role, RoleMap};
use arbor_scope::ScopeElement;
use tracing::debug;

use crate::entry::Match;

/// All matches of a comparison, plus bookkeeping for completed matches and
/// duplicate keys.
#[derive(Clone, Debug)]
pub struct Mapping<E: ScopeElement> {
    matches: Vec<Match<E>>,
    by_element: RoleMap<HashMap<E, MatchId>>,
    by_key: RoleMap<HashMap<MatchKey, MatchId>>,
    completed: RoleMap<Vec<MatchId>>,
    duplicates: RoleMap<Vec<MatchKey>>,
}

impl<E: ScopeElement> Default for Mapping<E> {
    fn default() -> Self {
        Self {
            matches: Vec::new(),
            by_element: RoleMap::from_fn(|_| HashMap::new()),
            by_key: RoleMap::from_fn(|_| HashMap::new()),
            completed: RoleMap::from_fn(|_| Vec::new()),
            duplicates: RoleMap::from_fn(|_| Vec::new()),
        }
    }
}

impl<E: ScopeElement> Mapping<E> {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matches, removed ones included.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: MatchId) -> Option<&Match<E>> {
        self.matches.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Match<E>> {
        self.matches.iter()
    }

    /// Matches holding an element in `role`.
    pub fn matches_in(&self, role: Role) -> impl Iterator<Item = &Match<E>> {
        self.matches.iter().filter(move |m| m.has(role))
    }

    /// The match covering `element` in `role`.
    pub fn match_for(&self, element: &E, role: Role) -> Option<MatchId> {
        self.by_element.get(role).get(element).copied()
    }

    /// The representative match of `key` in `role`.
    pub fn match_for_key(&self, key: &MatchKey, role: Role) -> Option<MatchId> {
        self.by_key.get(role).get(key).copied()
    }

    /// Element of match `id` in `role`.
    pub fn element(&self, id: MatchId, role: Role) -> Option<&E> {
        self.get(id).and_then(|m| m.element(role))
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    /// Create a match for `element` in `role`.
    ///
    /// If `key` is already represented in `role`, the key is recorded as a
    /// duplicate and the element gets a match of its own. Otherwise, when
    /// another role already has a match for `key` lacking `role`, the element
    /// joins it.
    pub fn register(&mut self, element: E, role: Role, key: Option<MatchKey>) -> MatchId {
        if let Some(existing) = self.match_for(&element, role) {
            return existing;
        }
        let Some(key) = key else {
            return self.push(element, role, None, false);
        };

        if self.by_key.get(role).contains_key(&key) {
            if !self.duplicates.get(role).contains(&key) {
                self.duplicates.get_mut(role).push(key.clone());
            }
            debug!(%role, key = %key, "duplicate match key");
            return self.push(element, role, Some(key), false);
        }

        let joinable = Role::ALL
            .into_iter()
            .filter(|r| *r != role)
            .filter_map(|r| self.match_for_key(&key, r))
            .find(|id| self.get(*id).is_some_and(|m| !m.has(role)));

        let id = match joinable {
            Some(id) => {
                self.attach(id, role, element);
                id
            }
            None => self.push(element, role, Some(key.clone()), false),
        };
        self.by_key.get_mut(role).insert(key, id);
        id
    }

    /// Ensure `element` (in `role`) has a match, creating a completed match
    /// if it was not part of the enumerated content.
    ///
    /// A completed match joins another role's completed match carrying the
    /// same key when that match has no element in `role` yet. Matches of
    /// enumerated content are never joined this way.
    pub fn map(&mut self, element: E, role: Role, key: Option<MatchKey>) -> MatchId {
        if let Some(existing) = self.match_for(&element, role) {
            return existing;
        }
        let joinable = key.as_ref().and_then(|k| {
            Role::ALL
                .into_iter()
                .filter(|r| *r != role)
                .filter_map(|r| self.match_for_key(k, r))
                .find(|id| {
                    self.get(*id)
                        .is_some_and(|m| m.is_completed() && !m.has(role))
                })
        });
        let id = match joinable {
            Some(id) => {
                self.attach(id, role, element);
                id
            }
            None => self.push(element, role, key.clone(), true),
        };
        if let Some(key) = key {
            self.by_key.get_mut(role).entry(key).or_insert(id);
        }
        self.completed.get_mut(role).push(id);
        debug!(%role, match_id = %id, "completed match");
        id
    }

    /// Record the containing match of match `id` in `role`.
    pub fn set_container(&mut self, id: MatchId, role: Role, container: Option<MatchId>) {
        if let Some(m) = self.matches.get_mut(id.index()) {
            m.set_container(role, container);
        }
    }

    /// Give match `id` an element in `role` (e.g. after merge added it).
    ///
    /// Returns `false` if the match does not exist or already has an
    /// element in `role`.
    pub fn add_element(&mut self, id: MatchId, role: Role, element: E) -> bool {
        match self.get(id) {
            Some(m) if !m.has(role) => {
                self.attach(id, role, element);
                true
            }
            _ => false,
        }
    }

    /// Remove `element` from its match in `role`.
    ///
    /// Returns `true` if the element was mapped.
    pub fn disconnect(&mut self, role: Role, element: &E) -> bool {
        let Some(id) = self.by_element.get_mut(role).remove(element) else {
            return false;
        };
        if let Some(m) = self.matches.get_mut(id.index()) {
            m.take_element(role);
            if let Some(key) = m.key() {
                if self.by_key.get(role).get(key) == Some(&id) {
                    self.by_key.get_mut(role).remove(key);
                }
            }
        }
        true
    }

    // ---------------------------------------------------------------
    // Bookkeeping queries
    // ---------------------------------------------------------------

    /// Matches created to complete references in `role`.
    pub fn completed_matches(&self, role: Role) -> &[MatchId] {
        self.completed.get(role)
    }

    /// Keys held by more than one element of `role`.
    pub fn duplicate_keys(&self, role: Role) -> &[MatchKey] {
        self.duplicates.get(role)
    }

    /// `true` iff no role has duplicate keys.
    pub fn is_consistent(&self) -> bool {
        Role::ALL
            .into_iter()
            .all(|r| self.duplicates.get(r).is_empty())
    }

    fn push(&mut self, element: E, role: Role, key: Option<MatchKey>, completed: bool) -> MatchId {
        let id = MatchId::from_index(self.matches.len());
        self.matches.push(Match::new(id, key, completed));
        self.attach(id, role, element);
        id
    }

    fn attach(&mut self, id: MatchId, role: Role, element: E) {
        self.by_element.get_mut(role).insert(element.clone(), id);
        if let Some(m) = self.matches.get_mut(id.index()) {
            m.set_element(role, Some(element));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Option<MatchKey> {
        Some(MatchKey::from(s))
    }

    #[test]
    fn same_key_joins_across_roles() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, key("a"));
        let b = mapping.register(10, Role::Reference, key("a"));
        assert_eq!(a, b);
        let m = mapping.get(a).unwrap();
        assert_eq!(m.element(Role::Target), Some(&1));
        assert_eq!(m.element(Role::Reference), Some(&10));
        assert!(mapping.is_consistent());
    }

    #[test]
    fn different_keys_stay_apart() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, key("a"));
        let b = mapping.register(2, Role::Reference, key("b"));
        assert_ne!(a, b);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get(a).unwrap().presence_role(), Some(Role::Target));
    }

    #[test]
    fn duplicate_key_is_recorded_and_first_wins() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let first = mapping.register(1, Role::Target, key("x"));
        let second = mapping.register(2, Role::Target, key("x"));
        let other = mapping.register(3, Role::Reference, key("x"));

        assert_ne!(first, second);
        assert_eq!(other, first);
        assert!(!mapping.is_consistent());
        assert_eq!(mapping.duplicate_keys(Role::Target), &[MatchKey::from("x")]);
        assert!(mapping.duplicate_keys(Role::Reference).is_empty());
        assert_eq!(mapping.match_for(&2, Role::Target), Some(second));
    }

    #[test]
    fn register_is_idempotent_per_element() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, key("a"));
        assert_eq!(mapping.register(1, Role::Target, key("a")), a);
        assert!(mapping.is_consistent());
    }

    #[test]
    fn excluded_key_gets_its_own_match() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, None);
        let b = mapping.register(1, Role::Reference, None);
        assert_ne!(a, b);
    }

    #[test]
    fn map_creates_completed_match() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let id = mapping.map(42, Role::Reference, key("lib"));
        assert!(mapping.get(id).unwrap().is_completed());
        assert_eq!(mapping.completed_matches(Role::Reference), &[id]);

        let joined = mapping.map(7, Role::Target, key("lib"));
        assert_eq!(joined, id);
        assert_eq!(mapping.completed_matches(Role::Target), &[id]);
    }

    #[test]
    fn map_does_not_join_content_matches() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let content = mapping.register(1, Role::Target, key("lib"));
        let completed = mapping.map(9, Role::Reference, key("lib"));
        assert_ne!(content, completed);
        assert!(!mapping.get(content).unwrap().has(Role::Reference));
    }

    #[test]
    fn map_returns_existing_match() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, key("a"));
        assert_eq!(mapping.map(1, Role::Target, key("a")), a);
        assert!(mapping.completed_matches(Role::Target).is_empty());
    }

    #[test]
    fn disconnect_and_add_element() {
        let mut mapping: Mapping<u32> = Mapping::new();
        let a = mapping.register(1, Role::Target, key("a"));
        assert!(mapping.disconnect(Role::Target, &1));
        assert!(!mapping.disconnect(Role::Target, &1));
        assert!(mapping.get(a).unwrap().is_removed());
        assert_eq!(mapping.match_for(&1, Role::Target), None);

        assert!(mapping.add_element(a, Role::Reference, 5));
        assert!(!mapping.add_element(a, Role::Reference, 6));
        assert!(!mapping.get(a).unwrap().is_removed());
        assert_eq!(mapping.match_for(&5, Role::Reference), Some(a));
    }
}
