use std::fmt;
use std::hash::Hash;

use arbor_types::{AttributeValue, Feature, FeatureKind};

use crate::error::ScopeResult;

/// Bounds required of an element handle.
///
/// The engine never inspects an element; it only stores, hashes, and
/// compares handles and passes them back to the scope that issued them.
pub trait ScopeElement: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> ScopeElement for T {}

/// Read-only tree view over external data.
///
/// All implementations must satisfy these invariants:
/// - `children()` returns elements in a stable, significant order.
/// - `container(c) == Some(p)` iff `c` appears in `children(p)`.
/// - Attribute and reference value lists preserve their order.
/// - The view does not change while a comparison reads it.
pub trait TreeDataScope {
    /// Opaque element handle.
    type Element: ScopeElement;

    /// Human-readable name of the scope (file name, model name, ...).
    fn label(&self) -> &str;

    /// Whether merges into this scope are forbidden.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Root elements, in order.
    fn roots(&self) -> Vec<Self::Element>;

    /// Ordered children of `element`.
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// The element containing `element`, if any.
    fn container(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Type name of `element`. Elements of equal kind share a feature set.
    fn kind(&self, element: &Self::Element) -> String;

    /// Attribute and reference features declared for the element's kind.
    fn features(&self, element: &Self::Element) -> Vec<Feature>;

    /// Values of an attribute feature, in order.
    fn attribute_values(&self, element: &Self::Element, feature: &Feature) -> Vec<AttributeValue>;

    /// Values of a reference feature, in order.
    fn reference_values(&self, element: &Self::Element, feature: &Feature) -> Vec<Self::Element>;

    /// Look up a feature by name and kind.
    fn feature(&self, element: &Self::Element, name: &str, kind: FeatureKind) -> Option<Feature> {
        self.features(element)
            .into_iter()
            .find(|f| f.kind == kind && f.name == name)
    }

    /// Every element reachable from the roots, depth-first, roots first.
    fn all_contents(&self) -> Vec<Self::Element> {
        let mut result = Vec::new();
        let mut stack: Vec<Self::Element> = self.roots().into_iter().rev().collect();
        while let Some(element) = stack.pop() {
            stack.extend(self.children(&element).into_iter().rev());
            result.push(element);
        }
        result
    }

    /// `element` followed by all of its descendants, depth-first.
    fn subtree(&self, element: &Self::Element) -> Vec<Self::Element> {
        let mut result = Vec::new();
        let mut stack = vec![element.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).into_iter().rev());
            result.push(current);
        }
        result
    }

    /// Whether `element` is reachable from one of the roots.
    fn is_in_content(&self, element: &Self::Element) -> bool {
        let roots = self.roots();
        let mut current = element.clone();
        loop {
            match self.container(&current) {
                Some(parent) => current = parent,
                None => return roots.contains(&current),
            }
        }
    }
}

/// Editable extension of [`TreeDataScope`] used as a merge destination.
pub trait EditableTreeDataScope: TreeDataScope {
    /// Create a detached element of the given kind.
    fn create_element(&mut self, kind: &str) -> ScopeResult<Self::Element>;

    /// Attach a detached element under `parent` (or as a root when `None`)
    /// at `position`, or at the end when `position` is `None`.
    fn add_child(
        &mut self,
        parent: Option<&Self::Element>,
        child: &Self::Element,
        position: Option<usize>,
    ) -> ScopeResult<()>;

    /// Move an attached element, with its subtree, under `parent` (or to the
    /// roots when `None`) at `position`, or at the end when `position` is
    /// `None`. The position counts siblings after the element has left its
    /// current place.
    fn move_element(
        &mut self,
        element: &Self::Element,
        parent: Option<&Self::Element>,
        position: Option<usize>,
    ) -> ScopeResult<()>;

    /// Remove an element and its whole subtree from the scope.
    fn remove_element(&mut self, element: &Self::Element) -> ScopeResult<()>;

    /// Replace all values of an attribute feature.
    fn set_attribute_values(
        &mut self,
        element: &Self::Element,
        feature: &Feature,
        values: Vec<AttributeValue>,
    ) -> ScopeResult<()>;

    /// Replace all values of a reference feature.
    fn set_reference_values(
        &mut self,
        element: &Self::Element,
        feature: &Feature,
        values: Vec<Self::Element>,
    ) -> ScopeResult<()>;

    /// Whether incoming references must be cleared before
    /// [`remove_element`](Self::remove_element) succeeds.
    fn requires_disconnection(&self) -> bool {
        false
    }

    /// `(holder, feature)` pairs whose reference values contain `element`.
    ///
    /// The default implementation scans every element in the content.
    fn incoming_references(&self, element: &Self::Element) -> Vec<(Self::Element, Feature)> {
        let mut result = Vec::new();
        for holder in self.all_contents() {
            for feature in self.features(&holder) {
                if feature.is_reference()
                    && self.reference_values(&holder, &feature).contains(element)
                {
                    result.push((holder.clone(), feature));
                }
            }
        }
        result
    }
}
