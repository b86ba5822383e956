use arbor_types::{MatchId, MatchKey, Role, RoleMap};

/// "The same logical element" across up to three roles.
///
/// Matches are created during matching (or when completing a reference) and
/// are never destroyed. When a merge deletes the last side element of a
/// match, the match is flagged as removed instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<E> {
    id: MatchId,
    key: Option<MatchKey>,
    elements: RoleMap<Option<E>>,
    containers: RoleMap<Option<MatchId>>,
    completed: bool,
    removed: bool,
}

impl<E> Match<E> {
    pub(crate) fn new(id: MatchId, key: Option<MatchKey>, completed: bool) -> Self {
        Self {
            id,
            key,
            elements: RoleMap::new(None, None, None),
            containers: RoleMap::new(None, None, None),
            completed,
            removed: false,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Identifier computed by the match policy, if any.
    pub fn key(&self) -> Option<&MatchKey> {
        self.key.as_ref()
    }

    pub fn element(&self, role: Role) -> Option<&E> {
        self.elements.get(role).as_ref()
    }

    pub fn has(&self, role: Role) -> bool {
        self.elements.get(role).is_some()
    }

    /// Roles holding an element.
    pub fn roles(&self) -> Vec<Role> {
        self.elements.present_roles()
    }

    /// `true` when both TARGET and REFERENCE hold an element.
    pub fn is_complete(&self) -> bool {
        self.has(Role::Target) && self.has(Role::Reference)
    }

    /// The only side (TARGET or REFERENCE) holding an element, if exactly one does.
    pub fn presence_role(&self) -> Option<Role> {
        match (self.has(Role::Target), self.has(Role::Reference)) {
            (true, false) => Some(Role::Target),
            (false, true) => Some(Role::Reference),
            _ => None,
        }
    }

    /// Containing match of the element in `role`.
    pub fn container(&self, role: Role) -> Option<MatchId> {
        *self.containers.get(role)
    }

    /// Containing match regardless of role: TARGET first, then REFERENCE,
    /// then ANCESTOR.
    pub fn owner(&self) -> Option<MatchId> {
        Role::ALL.into_iter().find_map(|r| self.container(r))
    }

    /// Created to complete a reference leaving the compared content.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// All side elements were deleted by merges.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn set_element(&mut self, role: Role, element: Option<E>) -> Option<E> {
        if element.is_some() {
            self.removed = false;
        }
        self.elements.set(role, element)
    }

    /// Drop the element in `role`; flags the match as removed when no side
    /// element is left.
    pub(crate) fn take_element(&mut self, role: Role) -> Option<E> {
        let previous = self.elements.set(role, None);
        self.removed = !self.has(Role::Target) && !self.has(Role::Reference);
        previous
    }

    pub(crate) fn set_container(&mut self, role: Role, container: Option<MatchId>) {
        self.containers.set(role, container);
    }
}
