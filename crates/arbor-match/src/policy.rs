//! Match policies: how elements are identified across scopes.
//!
//! A policy maps an element to a [`MatchKey`]; two elements denote the same
//! logical element iff their keys are equal. Returning `None` excludes the
//! element from matching.
//!
//! Policies must be pure functions of the element's observable state for the
//! duration of one computation.

use std::fmt;

use arbor_scope::{ScopeElement, TreeDataScope};
use arbor_types::{FeatureKind, MatchKey, PolicyError, Role};

/// Computes match keys for elements.
///
/// The trait is object-safe and `Send + Sync` so a policy can be shared as
/// an `Arc<dyn MatchPolicy<E>>` and remembered by the comparison.
pub trait MatchPolicy<E: ScopeElement>: Send + Sync {
    /// Human-readable name, used in logs and errors.
    fn name(&self) -> &str;

    /// Key of `element`, read from `scope` which plays `role`.
    fn match_key(
        &self,
        element: &E,
        role: Role,
        scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<Option<MatchKey>, PolicyError>;
}

/// Structural identity: the containment path from the root, each step
/// being the element kind and its index among same-kind siblings.
///
/// This is the engine default. Elements outside the content get a path
/// prefixed with `~`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathMatchPolicy;

impl PathMatchPolicy {
    /// Compute the structural path of `element`.
    pub fn path_of<E: ScopeElement>(element: &E, scope: &dyn TreeDataScope<Element = E>) -> String {
        let roots = scope.roots();
        let mut segments = Vec::new();
        let mut current = element.clone();
        let detached = loop {
            let kind = scope.kind(&current);
            let parent = scope.container(&current);
            let siblings = match &parent {
                Some(p) => scope.children(p),
                None => roots.clone(),
            };
            let index = siblings
                .iter()
                .take_while(|s| **s != current)
                .filter(|s| scope.kind(s) == kind)
                .count();
            let in_list = siblings.contains(&current);
            segments.push(if in_list {
                format!("{kind}[{index}]")
            } else {
                kind
            });
            match parent {
                Some(p) => current = p,
                None => break !in_list,
            }
        };
        segments.reverse();
        let path = segments.join("/");
        if detached {
            format!("~/{path}")
        } else {
            format!("/{path}")
        }
    }
}

impl<E: ScopeElement> MatchPolicy<E> for PathMatchPolicy {
    fn name(&self) -> &str {
        "path"
    }

    fn match_key(
        &self,
        element: &E,
        _role: Role,
        scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<Option<MatchKey>, PolicyError> {
        Ok(Some(MatchKey::new(Self::path_of(element, scope))))
    }
}

/// Identity by the value of a named attribute (e.g. `id` or `uuid`).
///
/// Elements lacking the attribute fall back to their structural path, or
/// are excluded from matching when the fallback is disabled.
#[derive(Clone, Debug)]
pub struct AttributeMatchPolicy {
    attribute: String,
    fallback_to_path: bool,
}

impl AttributeMatchPolicy {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            fallback_to_path: true,
        }
    }

    /// Exclude elements without the attribute instead of using their path.
    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_path = false;
        self
    }
}

impl<E: ScopeElement> MatchPolicy<E> for AttributeMatchPolicy {
    fn name(&self) -> &str {
        "attribute"
    }

    fn match_key(
        &self,
        element: &E,
        _role: Role,
        scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<Option<MatchKey>, PolicyError> {
        let value = scope
            .feature(element, &self.attribute, FeatureKind::Attribute)
            .and_then(|f| scope.attribute_values(element, &f).into_iter().next());
        match value {
            Some(v) => Ok(Some(MatchKey::from(&v))),
            None if self.fallback_to_path => Ok(Some(MatchKey::new(PathMatchPolicy::path_of(
                element, scope,
            )))),
            None => Ok(None),
        }
    }
}

/// Identity by element handle: elements are the same iff their handles
/// convert to the same key. Suited to scopes cloned from one another.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMatchPolicy;

impl<E> MatchPolicy<E> for IdentityMatchPolicy
where
    E: ScopeElement + Into<MatchKey>,
{
    fn name(&self) -> &str {
        "identity"
    }

    fn match_key(
        &self,
        element: &E,
        _role: Role,
        _scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<Option<MatchKey>, PolicyError> {
        Ok(Some(element.clone().into()))
    }
}

/// Adapter turning a closure into a [`MatchPolicy`].
pub struct FnMatchPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnMatchPolicy<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnMatchPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMatchPolicy")
            .field("name", &self.name)
            .finish()
    }
}

impl<E, F> MatchPolicy<E> for FnMatchPolicy<F>
where
    E: ScopeElement,
    F: Fn(&E, Role, &dyn TreeDataScope<Element = E>) -> Result<Option<MatchKey>, PolicyError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn match_key(
        &self,
        element: &E,
        role: Role,
        scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<Option<MatchKey>, PolicyError> {
        (self.f)(element, role, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_scope::{ElementId, MemoryScope, Schema};
    use arbor_types::Feature;

    fn scope() -> (MemoryScope, ElementId, ElementId, ElementId, ElementId) {
        let schema = Schema::new()
            .with_kind("Pkg", vec![Feature::attribute("id")])
            .with_kind("Cls", vec![Feature::attribute("id")])
            .with_kind("Op", vec![]);
        let mut s = MemoryScope::new("s", schema);
        let pkg = s.add_root("Pkg");
        let op = s.add_child_of(pkg, "Op").unwrap();
        let c1 = s.add_child_of(pkg, "Cls").unwrap();
        let c2 = s.add_child_of(pkg, "Cls").unwrap();
        s.set_attr(c2, "id", ["c-2"]).unwrap();
        (s, pkg, op, c1, c2)
    }

    #[test]
    fn path_counts_same_kind_siblings_only() {
        let (s, pkg, op, c1, c2) = scope();
        assert_eq!(PathMatchPolicy::path_of(&pkg, &s), "/Pkg[0]");
        assert_eq!(PathMatchPolicy::path_of(&op, &s), "/Pkg[0]/Op[0]");
        assert_eq!(PathMatchPolicy::path_of(&c1, &s), "/Pkg[0]/Cls[0]");
        assert_eq!(PathMatchPolicy::path_of(&c2, &s), "/Pkg[0]/Cls[1]");
    }

    #[test]
    fn path_of_detached_element_is_marked() {
        let (mut s, ..) = scope();
        let lib = s.add_detached("Cls");
        assert_eq!(PathMatchPolicy::path_of(&lib, &s), "~/Cls");
    }

    #[test]
    fn attribute_policy_uses_value_then_path() {
        let (s, _, _, c1, c2) = scope();
        let policy = AttributeMatchPolicy::new("id");
        let k2 = policy.match_key(&c2, Role::Target, &s).unwrap().unwrap();
        assert_eq!(k2.as_str(), "c-2");
        let k1 = policy.match_key(&c1, Role::Target, &s).unwrap().unwrap();
        assert_eq!(k1.as_str(), "/Pkg[0]/Cls[0]");

        let strict = AttributeMatchPolicy::new("id").without_fallback();
        assert_eq!(strict.match_key(&c1, Role::Target, &s).unwrap(), None);
    }

    #[test]
    fn identity_policy_uses_handle() {
        let (s, pkg, ..) = scope();
        let key = IdentityMatchPolicy.match_key(&pkg, Role::Reference, &s).unwrap();
        assert_eq!(key, Some(MatchKey::from(pkg.as_u64())));
    }

    #[test]
    fn fn_policy_delegates_and_propagates_errors() {
        let (s, pkg, ..) = scope();
        let policy = FnMatchPolicy::new(
            "failing",
            |_: &ElementId,
             _: Role,
             _: &dyn TreeDataScope<Element = ElementId>|
             -> Result<Option<MatchKey>, PolicyError> { Err(PolicyError::new("failing", "no key")) },
        );
        assert_eq!(MatchPolicy::<ElementId>::name(&policy), "failing");
        assert!(policy.match_key(&pkg, Role::Target, &s).is_err());
    }
}
