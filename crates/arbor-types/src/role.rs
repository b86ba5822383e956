use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The side of a comparison an element or value belongs to.
///
/// TARGET and REFERENCE are symmetric. ANCESTOR is only present in
/// three-way comparisons and is never modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// The left-hand side of the comparison.
    Target,
    /// The right-hand side of the comparison.
    Reference,
    /// The common ancestor of TARGET and REFERENCE (three-way only).
    Ancestor,
}

impl Role {
    /// All roles, in traversal order.
    pub const ALL: [Role; 3] = [Role::Target, Role::Reference, Role::Ancestor];

    /// The two roles that may receive merges.
    pub const SIDES: [Role; 2] = [Role::Target, Role::Reference];

    /// The symmetric side. ANCESTOR is its own opposite.
    pub fn opposite(self) -> Role {
        match self {
            Role::Target => Role::Reference,
            Role::Reference => Role::Target,
            Role::Ancestor => Role::Ancestor,
        }
    }

    /// Returns `true` for TARGET and REFERENCE.
    pub fn is_side(self) -> bool {
        !matches!(self, Role::Ancestor)
    }

    fn index(self) -> usize {
        match self {
            Role::Target => 0,
            Role::Reference => 1,
            Role::Ancestor => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => write!(f, "TARGET"),
            Self::Reference => write!(f, "REFERENCE"),
            Self::Ancestor => write!(f, "ANCESTOR"),
        }
    }
}

impl FromStr for Role {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "target" => Ok(Role::Target),
            "reference" => Ok(Role::Reference),
            "ancestor" => Ok(Role::Ancestor),
            _ => Err(TypeError::InvalidRole(s.to_string())),
        }
    }
}

/// A fixed-size container holding one value per [`Role`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleMap<T> {
    slots: [T; 3],
}

impl<T> RoleMap<T> {
    /// Build a map from explicit per-role values.
    pub fn new(target: T, reference: T, ancestor: T) -> Self {
        Self {
            slots: [target, reference, ancestor],
        }
    }

    /// Build a map by evaluating `f` for each role.
    pub fn from_fn(mut f: impl FnMut(Role) -> T) -> Self {
        Self {
            slots: [f(Role::Target), f(Role::Reference), f(Role::Ancestor)],
        }
    }

    pub fn get(&self, role: Role) -> &T {
        &self.slots[role.index()]
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        &mut self.slots[role.index()]
    }

    /// Replace the value for `role`, returning the previous one.
    pub fn set(&mut self, role: Role, value: T) -> T {
        std::mem::replace(&mut self.slots[role.index()], value)
    }

    /// Mutable access to `write` together with shared access to `read`.
    ///
    /// Returns `None` when both roles are the same.
    pub fn split_mut(&mut self, write: Role, read: Role) -> Option<(&mut T, &T)> {
        let (w, r) = (write.index(), read.index());
        if w == r {
            return None;
        }
        if w < r {
            let (low, high) = self.slots.split_at_mut(r);
            Some((&mut low[w], &high[0]))
        } else {
            let (low, high) = self.slots.split_at_mut(w);
            Some((&mut high[0], &low[r]))
        }
    }

    /// Exchange the TARGET and REFERENCE values.
    pub fn swap_sides(&mut self) {
        self.slots.swap(0, 1);
    }

    /// Iterate over `(role, value)` pairs in [`Role::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T> RoleMap<Option<T>> {
    /// Roles whose slot is populated.
    pub fn present_roles(&self) -> Vec<Role> {
        self.iter()
            .filter(|(_, v)| v.is_some())
            .map(|(r, _)| r)
            .collect()
    }
}
