use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use arbor_types::{AttributeValue, Feature, FeatureKind};

use crate::error::{ScopeError, ScopeResult};
use crate::traits::{EditableTreeDataScope, TreeDataScope};

/// Handle of an element inside a [`MemoryScope`].
///
/// Handles are allocated sequentially per scope. A cloned scope keeps the
/// handles of the original, so two clones can be compared by identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<ElementId> for arbor_types::MatchKey {
    fn from(id: ElementId) -> Self {
        arbor_types::MatchKey::from(id.0)
    }
}

/// Feature declarations per element kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    kinds: BTreeMap<String, Vec<Feature>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or extend) a kind with the given features.
    pub fn with_kind(mut self, kind: impl Into<String>, features: Vec<Feature>) -> Self {
        self.kinds.entry(kind.into()).or_default().extend(features);
        self
    }

    /// Features of `kind`; empty for undeclared kinds.
    pub fn features(&self, kind: &str) -> &[Feature] {
        self.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find(&self, kind: &str, name: &str, feature_kind: FeatureKind) -> Option<&Feature> {
        self.features(kind)
            .iter()
            .find(|f| f.kind == feature_kind && f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    kind: String,
    parent: Option<ElementId>,
    attached: bool,
    children: Vec<ElementId>,
    attributes: BTreeMap<String, Vec<AttributeValue>>,
    references: BTreeMap<String, Vec<ElementId>>,
}

impl Node {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            parent: None,
            attached: false,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }
}

/// In-memory, editable tree scope.
///
/// Intended for tests and embedding. Elements may exist detached from the
/// tree (created but never attached); such elements can still be the target
/// of references, which makes them "outside the compared content".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryScope {
    label: String,
    schema: Schema,
    nodes: BTreeMap<ElementId, Node>,
    roots: Vec<ElementId>,
    next_id: u64,
    read_only: bool,
    disconnection_required: bool,
}

impl MemoryScope {
    /// Create an empty scope.
    pub fn new(label: impl Into<String>, schema: Schema) -> Self {
        Self {
            label: label.into(),
            schema,
            nodes: BTreeMap::new(),
            roots: Vec::new(),
            next_id: 1,
            read_only: false,
            disconnection_required: false,
        }
    }

    /// Forbid merges into this scope.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Require incoming references to be cleared before removal.
    pub fn with_disconnection_required(mut self, required: bool) -> Self {
        self.disconnection_required = required;
        self
    }

    /// Rename the scope, e.g. after cloning it.
    pub fn relabel(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of elements, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.nodes.contains_key(&element)
    }

    // ---------------------------------------------------------------
    // Building
    // ---------------------------------------------------------------

    /// Append a new root element.
    pub fn add_root(&mut self, kind: &str) -> ElementId {
        let id = self.allocate(kind);
        self.roots.push(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attached = true;
        }
        id
    }

    /// Append a new child under `parent`.
    pub fn add_child_of(&mut self, parent: ElementId, kind: &str) -> ScopeResult<ElementId> {
        if !self.nodes.contains_key(&parent) {
            return Err(ScopeError::UnknownElement(parent.to_string()));
        }
        let id = self.allocate(kind);
        self.attach(Some(parent), id, None)?;
        Ok(id)
    }

    /// Create an element that is not part of the tree.
    pub fn add_detached(&mut self, kind: &str) -> ElementId {
        self.allocate(kind)
    }

    /// Set the values of a named attribute.
    pub fn set_attr<V: Into<AttributeValue>>(
        &mut self,
        element: ElementId,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> ScopeResult<()> {
        let feature = self.declared(element, name, FeatureKind::Attribute)?;
        let values = values.into_iter().map(Into::into).collect();
        self.write_attribute(element, &feature, values)
    }

    /// Set the targets of a named reference.
    pub fn set_refs(
        &mut self,
        element: ElementId,
        name: &str,
        targets: impl IntoIterator<Item = ElementId>,
    ) -> ScopeResult<()> {
        let feature = self.declared(element, name, FeatureKind::Reference)?;
        self.write_references(element, &feature, targets.into_iter().collect())
    }

    // ---------------------------------------------------------------
    // Convenience reads
    // ---------------------------------------------------------------

    /// Values of a named attribute; empty if unset or undeclared.
    pub fn attr(&self, element: ElementId, name: &str) -> Vec<AttributeValue> {
        self.nodes
            .get(&element)
            .and_then(|n| n.attributes.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Targets of a named reference; empty if unset or undeclared.
    pub fn refs(&self, element: ElementId, name: &str) -> Vec<ElementId> {
        self.nodes
            .get(&element)
            .and_then(|n| n.references.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// First attached element whose attribute `name` holds `value`.
    pub fn find_by_attr(&self, name: &str, value: &AttributeValue) -> Option<ElementId> {
        self.all_contents()
            .into_iter()
            .find(|e| self.attr(*e, name).contains(value))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn allocate(&mut self, kind: &str) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn node(&self, element: ElementId) -> ScopeResult<&Node> {
        self.nodes
            .get(&element)
            .ok_or_else(|| ScopeError::UnknownElement(element.to_string()))
    }

    fn node_mut(&mut self, element: ElementId) -> ScopeResult<&mut Node> {
        self.nodes
            .get_mut(&element)
            .ok_or_else(|| ScopeError::UnknownElement(element.to_string()))
    }

    fn declared(&self, element: ElementId, name: &str, kind: FeatureKind) -> ScopeResult<Feature> {
        let node = self.node(element)?;
        self.schema
            .find(&node.kind, name, kind)
            .cloned()
            .ok_or_else(|| ScopeError::UnknownFeature {
                kind: node.kind.clone(),
                feature: name.to_string(),
            })
    }

    fn check_writable(&self) -> ScopeResult<()> {
        if self.read_only {
            return Err(ScopeError::ReadOnly(self.label.clone()));
        }
        Ok(())
    }

    fn check_arity(feature: &Feature, count: usize) -> ScopeResult<()> {
        if !feature.many && count > 1 {
            return Err(ScopeError::TooManyValues {
                feature: feature.name.clone(),
                count,
            });
        }
        Ok(())
    }

    fn write_attribute(
        &mut self,
        element: ElementId,
        feature: &Feature,
        values: Vec<AttributeValue>,
    ) -> ScopeResult<()> {
        Self::check_arity(feature, values.len())?;
        let node = self.node_mut(element)?;
        if values.is_empty() {
            node.attributes.remove(&feature.name);
        } else {
            node.attributes.insert(feature.name.clone(), values);
        }
        Ok(())
    }

    fn write_references(
        &mut self,
        element: ElementId,
        feature: &Feature,
        targets: Vec<ElementId>,
    ) -> ScopeResult<()> {
        Self::check_arity(feature, targets.len())?;
        if let Some(missing) = targets.iter().find(|t| !self.nodes.contains_key(t)) {
            return Err(ScopeError::UnknownElement(missing.to_string()));
        }
        let node = self.node_mut(element)?;
        if targets.is_empty() {
            node.references.remove(&feature.name);
        } else {
            node.references.insert(feature.name.clone(), targets);
        }
        Ok(())
    }

    fn attach(
        &mut self,
        parent: Option<ElementId>,
        child: ElementId,
        position: Option<usize>,
    ) -> ScopeResult<()> {
        if self.node(child)?.attached {
            return Err(ScopeError::AlreadyAttached(child.to_string()));
        }
        let siblings_len = match parent {
            Some(p) => {
                if self.ancestry(p).contains(&child) {
                    return Err(ScopeError::ContainmentCycle(child.to_string()));
                }
                self.node(p)?.children.len()
            }
            None => self.roots.len(),
        };
        let index = position.unwrap_or(siblings_len);
        if index > siblings_len {
            return Err(ScopeError::InvalidPosition {
                position: index,
                len: siblings_len,
            });
        }
        match parent {
            Some(p) => self.node_mut(p)?.children.insert(index, child),
            None => self.roots.insert(index, child),
        }
        let node = self.node_mut(child)?;
        node.parent = parent;
        node.attached = true;
        Ok(())
    }

    /// `element` and its containers, innermost first.
    fn ancestry(&self, element: ElementId) -> Vec<ElementId> {
        let mut chain = vec![element];
        let mut current = element;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

impl fmt::Debug for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScope")
            .field("label", &self.label)
            .field("element_count", &self.nodes.len())
            .field("root_count", &self.roots.len())
            .finish()
    }
}

impl TreeDataScope for MemoryScope {
    type Element = ElementId;

    fn label(&self) -> &str {
        &self.label
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn roots(&self) -> Vec<ElementId> {
        self.roots.clone()
    }

    fn children(&self, element: &ElementId) -> Vec<ElementId> {
        self.nodes
            .get(element)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn container(&self, element: &ElementId) -> Option<ElementId> {
        self.nodes.get(element).and_then(|n| n.parent)
    }

    fn kind(&self, element: &ElementId) -> String {
        self.nodes
            .get(element)
            .map(|n| n.kind.clone())
            .unwrap_or_default()
    }

    fn features(&self, element: &ElementId) -> Vec<Feature> {
        self.nodes
            .get(element)
            .map(|n| self.schema.features(&n.kind).to_vec())
            .unwrap_or_default()
    }

    fn attribute_values(&self, element: &ElementId, feature: &Feature) -> Vec<AttributeValue> {
        self.attr(*element, &feature.name)
    }

    fn reference_values(&self, element: &ElementId, feature: &Feature) -> Vec<ElementId> {
        self.refs(*element, &feature.name)
    }
}

impl EditableTreeDataScope for MemoryScope {
    fn create_element(&mut self, kind: &str) -> ScopeResult<ElementId> {
        self.check_writable()?;
        Ok(self.allocate(kind))
    }

    fn add_child(
        &mut self,
        parent: Option<&ElementId>,
        child: &ElementId,
        position: Option<usize>,
    ) -> ScopeResult<()> {
        self.check_writable()?;
        self.attach(parent.copied(), *child, position)
    }

    fn move_element(
        &mut self,
        element: &ElementId,
        parent: Option<&ElementId>,
        position: Option<usize>,
    ) -> ScopeResult<()> {
        self.check_writable()?;
        let node = self.node(*element)?;
        if !node.attached {
            return Err(ScopeError::NotAttached(element.to_string()));
        }
        let from = node.parent;
        let mut len = match parent {
            Some(p) => {
                if self.ancestry(*p).contains(element) {
                    return Err(ScopeError::ContainmentCycle(element.to_string()));
                }
                self.node(*p)?.children.len()
            }
            None => self.roots.len(),
        };
        if from == parent.copied() {
            len -= 1;
        }
        if let Some(index) = position.filter(|i| *i > len) {
            return Err(ScopeError::InvalidPosition { position: index, len });
        }

        match from {
            Some(p) => self.node_mut(p)?.children.retain(|c| c != element),
            None => self.roots.retain(|r| r != element),
        }
        self.node_mut(*element)?.attached = false;
        self.attach(parent.copied(), *element, position)?;
        debug!(scope = %self.label, element = %element, "moved element");
        Ok(())
    }

    fn remove_element(&mut self, element: &ElementId) -> ScopeResult<()> {
        self.check_writable()?;
        self.node(*element)?;
        let subtree: BTreeSet<ElementId> = self.subtree(element).into_iter().collect();

        let mut holders: Vec<(ElementId, String)> = Vec::new();
        for (id, node) in &self.nodes {
            if subtree.contains(id) {
                continue;
            }
            for (name, targets) in &node.references {
                if targets.iter().any(|t| subtree.contains(t)) {
                    holders.push((*id, name.clone()));
                }
            }
        }

        if !holders.is_empty() {
            if self.disconnection_required {
                return Err(ScopeError::StillReferenced {
                    element: element.to_string(),
                    count: holders.len(),
                });
            }
            for (holder, name) in &holders {
                if let Some(targets) = self
                    .nodes
                    .get_mut(holder)
                    .and_then(|n| n.references.get_mut(name))
                {
                    targets.retain(|t| !subtree.contains(t));
                }
            }
        }

        match self.nodes.get(element).and_then(|n| n.parent) {
            Some(parent) => self.node_mut(parent)?.children.retain(|c| c != element),
            None => self.roots.retain(|r| r != element),
        }
        for id in &subtree {
            self.nodes.remove(id);
        }
        debug!(
            scope = %self.label,
            element = %element,
            removed = subtree.len(),
            disconnected = holders.len(),
            "removed element"
        );
        Ok(())
    }

    fn set_attribute_values(
        &mut self,
        element: &ElementId,
        feature: &Feature,
        values: Vec<AttributeValue>,
    ) -> ScopeResult<()> {
        self.check_writable()?;
        self.declared(*element, &feature.name, FeatureKind::Attribute)?;
        self.write_attribute(*element, feature, values)
    }

    fn set_reference_values(
        &mut self,
        element: &ElementId,
        feature: &Feature,
        values: Vec<ElementId>,
    ) -> ScopeResult<()> {
        self.check_writable()?;
        self.declared(*element, &feature.name, FeatureKind::Reference)?;
        self.write_references(*element, feature, values)
    }

    fn requires_disconnection(&self) -> bool {
        self.disconnection_required
    }

    fn incoming_references(&self, element: &ElementId) -> Vec<(ElementId, Feature)> {
        let mut result = Vec::new();
        for (id, node) in &self.nodes {
            for (name, targets) in &node.references {
                if targets.contains(element) {
                    if let Some(feature) = self.schema.find(&node.kind, name, FeatureKind::Reference) {
                        result.push((*id, feature.clone()));
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .with_kind(
                "Package",
                vec![Feature::attribute("name"), Feature::attribute("tags").many(false)],
            )
            .with_kind(
                "Class",
                vec![
                    Feature::attribute("name"),
                    Feature::reference("super"),
                    Feature::reference("uses").many(true),
                ],
            )
    }

    fn sample() -> (MemoryScope, ElementId, ElementId, ElementId) {
        let mut scope = MemoryScope::new("sample", schema());
        let pkg = scope.add_root("Package");
        let a = scope.add_child_of(pkg, "Class").unwrap();
        let b = scope.add_child_of(pkg, "Class").unwrap();
        scope.set_attr(a, "name", ["A"]).unwrap();
        scope.set_attr(b, "name", ["B"]).unwrap();
        scope.set_refs(b, "super", [a]).unwrap();
        (scope, pkg, a, b)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    #[test]
    fn tree_structure_is_exposed_in_order() {
        let (scope, pkg, a, b) = sample();
        assert_eq!(scope.roots(), vec![pkg]);
        assert_eq!(scope.children(&pkg), vec![a, b]);
        assert_eq!(scope.container(&a), Some(pkg));
        assert_eq!(scope.kind(&a), "Class");
        assert_eq!(scope.all_contents(), vec![pkg, a, b]);
        assert_eq!(scope.subtree(&pkg), vec![pkg, a, b]);
    }

    #[test]
    fn features_come_from_schema() {
        let (scope, pkg, a, _) = sample();
        assert_eq!(scope.features(&pkg).len(), 2);
        assert!(scope.feature(&a, "super", FeatureKind::Reference).is_some());
        assert!(scope.feature(&a, "super", FeatureKind::Attribute).is_none());
    }

    #[test]
    fn values_are_returned() {
        let (scope, _, a, b) = sample();
        let name = Feature::attribute("name");
        assert_eq!(scope.attribute_values(&a, &name), vec![AttributeValue::from("A")]);
        assert_eq!(scope.reference_values(&b, &Feature::reference("super")), vec![a]);
        assert_eq!(scope.find_by_attr("name", &"B".into()), Some(b));
    }

    #[test]
    fn detached_elements_are_outside_content() {
        let (mut scope, _, a, _) = sample();
        let lib = scope.add_detached("Class");
        assert!(scope.is_in_content(&a));
        assert!(!scope.is_in_content(&lib));
        assert!(!scope.all_contents().contains(&lib));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn undeclared_feature_is_rejected() {
        let (mut scope, pkg, _, _) = sample();
        let err = scope.set_attr(pkg, "color", ["red"]).unwrap_err();
        assert!(matches!(err, ScopeError::UnknownFeature { .. }));
    }

    #[test]
    fn single_valued_feature_rejects_many_values() {
        let (mut scope, _, a, _) = sample();
        let err = scope.set_attr(a, "name", ["x", "y"]).unwrap_err();
        assert_eq!(
            err,
            ScopeError::TooManyValues {
                feature: "name".into(),
                count: 2
            }
        );
    }

    #[test]
    fn reference_to_unknown_element_is_rejected() {
        let (mut scope, _, a, _) = sample();
        let err = scope.set_refs(a, "uses", [ElementId(999)]).unwrap_err();
        assert!(matches!(err, ScopeError::UnknownElement(_)));
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    #[test]
    fn create_and_attach_at_position() {
        let (mut scope, pkg, a, b) = sample();
        let c = scope.create_element("Class").unwrap();
        scope.add_child(Some(&pkg), &c, Some(1)).unwrap();
        assert_eq!(scope.children(&pkg), vec![a, c, b]);
        assert!(matches!(
            scope.add_child(Some(&pkg), &c, None),
            Err(ScopeError::AlreadyAttached(_))
        ));
    }

    #[test]
    fn attach_out_of_bounds_fails() {
        let (mut scope, pkg, _, _) = sample();
        let c = scope.create_element("Class").unwrap();
        let err = scope.add_child(Some(&pkg), &c, Some(7)).unwrap_err();
        assert_eq!(err, ScopeError::InvalidPosition { position: 7, len: 2 });
    }

    #[test]
    fn attach_under_own_descendant_fails() {
        let mut scope = MemoryScope::new("s", schema());
        let detached = scope.add_detached("Package");
        let inner = scope.create_element("Class").unwrap();
        scope.add_child(Some(&detached), &inner, None).unwrap();
        let err = scope.add_child(Some(&inner), &detached, None).unwrap_err();
        assert!(matches!(err, ScopeError::ContainmentCycle(_)));
    }

    #[test]
    fn move_takes_subtree_to_new_place() {
        let (mut scope, pkg, a, b) = sample();
        scope.move_element(&b, None, Some(0)).unwrap();
        assert_eq!(scope.roots(), vec![b, pkg]);
        assert_eq!(scope.children(&pkg), vec![a]);
        assert_eq!(scope.container(&b), None);

        scope.move_element(&b, Some(&pkg), Some(0)).unwrap();
        assert_eq!(scope.children(&pkg), vec![b, a]);
        scope.move_element(&b, Some(&pkg), None).unwrap();
        assert_eq!(scope.children(&pkg), vec![a, b]);
        assert_eq!(scope.container(&b), Some(pkg));
    }

    #[test]
    fn invalid_moves_change_nothing() {
        let (mut scope, pkg, a, _) = sample();
        let before = scope.clone();
        let err = scope.move_element(&pkg, Some(&a), None).unwrap_err();
        assert!(matches!(err, ScopeError::ContainmentCycle(_)));
        let err = scope.move_element(&a, Some(&pkg), Some(2)).unwrap_err();
        assert_eq!(err, ScopeError::InvalidPosition { position: 2, len: 1 });
        assert_eq!(scope, before);

        let detached = scope.add_detached("Class");
        let err = scope.move_element(&detached, Some(&pkg), None).unwrap_err();
        assert!(matches!(err, ScopeError::NotAttached(_)));
        assert!(!scope.is_in_content(&detached));
    }

    #[test]
    fn remove_purges_incoming_references_by_default() {
        let (mut scope, pkg, a, b) = sample();
        scope.remove_element(&a).unwrap();
        assert_eq!(scope.children(&pkg), vec![b]);
        assert!(scope.refs(b, "super").is_empty());
        assert!(!scope.contains(a));
    }

    #[test]
    fn remove_requires_disconnection_when_configured() {
        let (scope, _, a, b) = sample();
        let mut scope = scope.with_disconnection_required(true);
        let err = scope.remove_element(&a).unwrap_err();
        assert!(matches!(err, ScopeError::StillReferenced { count: 1, .. }));

        assert_eq!(scope.incoming_references(&a).len(), 1);
        scope
            .set_reference_values(&b, &Feature::reference("super"), vec![])
            .unwrap();
        scope.remove_element(&a).unwrap();
        assert!(!scope.contains(a));
    }

    #[test]
    fn removing_a_subtree_removes_descendants() {
        let (mut scope, pkg, a, b) = sample();
        scope.remove_element(&pkg).unwrap();
        assert!(scope.roots().is_empty());
        assert!(!scope.contains(a));
        assert!(!scope.contains(b));
    }

    #[test]
    fn read_only_scope_rejects_edits() {
        let (scope, _, a, _) = sample();
        let mut scope = scope.with_read_only(true);
        assert!(scope.is_read_only());
        let err = scope
            .set_attribute_values(&a, &Feature::attribute("name"), vec!["Z".into()])
            .unwrap_err();
        assert!(matches!(err, ScopeError::ReadOnly(_)));
    }

    #[test]
    fn clone_preserves_element_handles() {
        let (scope, _, a, _) = sample();
        let copy = scope.clone().relabel("copy");
        assert_eq!(copy.label(), "copy");
        assert_eq!(copy.attr(a, "name"), vec![AttributeValue::from("A")]);
    }
}
