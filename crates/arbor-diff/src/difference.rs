//! Typed difference records.
//!
//! A [`Difference`] is immutable once created. Merging it retires it from
//! the live [`DifferenceSet`](crate::DifferenceSet); it is never edited in
//! place.

use std::fmt;

use serde::{Deserialize, Serialize};

use arbor_types::{AttributeValue, DifferenceId, Feature, MatchId, Role};

/// Coarse classification of a difference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DifferenceCategory {
    ElementPresence,
    AttributeValue,
    ReferenceValue,
}

impl fmt::Display for DifferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementPresence => write!(f, "element"),
            Self::AttributeValue => write!(f, "attribute"),
            Self::ReferenceValue => write!(f, "reference"),
        }
    }
}

/// Variant-specific payload of a difference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DifferenceKind<E> {
    /// The match has an element in the presence role only.
    ElementPresence {
        /// Container of the element in the presence role.
        owner: Option<MatchId>,
    },
    /// An attribute value held by the presence role only, or out of order.
    AttributeValue {
        feature: Feature,
        value: AttributeValue,
        is_order: bool,
    },
    /// A reference value held by the presence role only, or out of order.
    ReferenceValue {
        feature: Feature,
        /// The referenced element, as seen in the presence role.
        value: E,
        /// Match of the referenced element.
        value_match: MatchId,
        is_order: bool,
    },
}

/// A structural discrepancy between TARGET and REFERENCE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Difference<E> {
    pub(crate) id: DifferenceId,
    pub(crate) element_match: MatchId,
    pub(crate) role: Role,
    pub(crate) aligned_with_ancestor: bool,
    pub(crate) conflicting: bool,
    pub(crate) kind: DifferenceKind<E>,
}

impl<E> Difference<E> {
    pub fn id(&self) -> DifferenceId {
        self.id
    }

    /// The match the difference is about: the element itself for presences,
    /// the holder for value presences.
    pub fn element_match(&self) -> MatchId {
        self.element_match
    }

    /// The role holding the element or value.
    pub fn presence_role(&self) -> Role {
        self.role
    }

    /// The presence role holds the ancestor's state, so the change was made
    /// on the opposite side. Always `false` in two-way comparisons.
    pub fn is_aligned_with_ancestor(&self) -> bool {
        self.aligned_with_ancestor
    }

    /// Both sides changed the same thing since the ancestor.
    pub fn is_conflicting(&self) -> bool {
        self.conflicting
    }

    pub fn kind(&self) -> &DifferenceKind<E> {
        &self.kind
    }

    pub fn category(&self) -> DifferenceCategory {
        match self.kind {
            DifferenceKind::ElementPresence { .. } => DifferenceCategory::ElementPresence,
            DifferenceKind::AttributeValue { .. } => DifferenceCategory::AttributeValue,
            DifferenceKind::ReferenceValue { .. } => DifferenceCategory::ReferenceValue,
        }
    }

    pub fn is_element_presence(&self) -> bool {
        matches!(self.kind, DifferenceKind::ElementPresence { .. })
    }

    /// Attribute or reference value presence.
    pub fn is_value_presence(&self) -> bool {
        !self.is_element_presence()
    }

    /// An order-only value difference.
    pub fn is_order(&self) -> bool {
        match self.kind {
            DifferenceKind::ElementPresence { .. } => false,
            DifferenceKind::AttributeValue { is_order, .. }
            | DifferenceKind::ReferenceValue { is_order, .. } => is_order,
        }
    }

    /// The feature of a value presence.
    pub fn feature(&self) -> Option<&Feature> {
        match &self.kind {
            DifferenceKind::ElementPresence { .. } => None,
            DifferenceKind::AttributeValue { feature, .. }
            | DifferenceKind::ReferenceValue { feature, .. } => Some(feature),
        }
    }

    /// The value's match for a reference value presence.
    pub fn value_match(&self) -> Option<MatchId> {
        match &self.kind {
            DifferenceKind::ReferenceValue { value_match, .. } => Some(*value_match),
            _ => None,
        }
    }

    /// Owner of an element presence.
    pub fn owner(&self) -> Option<MatchId> {
        match &self.kind {
            DifferenceKind::ElementPresence { owner } => *owner,
            _ => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Difference<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DifferenceKind::ElementPresence { .. } => {
                write!(f, "{} {}: element only in {}", self.id, self.element_match, self.role)
            }
            DifferenceKind::AttributeValue {
                feature,
                value,
                is_order,
            } => {
                let what = if *is_order { "out of order" } else { "only" };
                write!(
                    f,
                    "{} {}.{feature}: value {value} {what} in {}",
                    self.id, self.element_match, self.role
                )
            }
            DifferenceKind::ReferenceValue {
                feature,
                value_match,
                is_order,
                ..
            } => {
                let what = if *is_order { "out of order" } else { "only" };
                write!(
                    f,
                    "{} {}.{feature}: reference to {value_match} {what} in {}",
                    self.id, self.element_match, self.role
                )
            }
        }
    }
}
