//! Diff policies: which features take part in a comparison and how.

use std::collections::BTreeSet;

use arbor_scope::{ScopeElement, TreeDataScope};
use arbor_types::{Feature, PolicyError, Role};

/// Decides feature coverage, order sensitivity and ignored references.
pub trait DiffPolicy<E: ScopeElement>: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `feature` is compared between `first` and `second`.
    fn covers_feature(
        &self,
        _feature: &Feature,
        _first: Role,
        _second: Role,
    ) -> Result<bool, PolicyError> {
        Ok(true)
    }

    /// Whether the order of values of `feature` matters.
    fn is_ordered(&self, feature: &Feature) -> bool {
        feature.many && feature.ordered
    }

    /// Whether the reference from `holder` to `target` (read in `role`)
    /// should be left out of the comparison.
    fn ignores_reference(
        &self,
        _holder: &E,
        _feature: &Feature,
        _target: &E,
        _role: Role,
        _scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<bool, PolicyError> {
        Ok(false)
    }
}

/// Everything covered, order taken from the feature declaration, no
/// ignored references.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDiffPolicy;

impl<E: ScopeElement> DiffPolicy<E> for DefaultDiffPolicy {
    fn name(&self) -> &str {
        "default"
    }
}

/// A configurable policy filtering features by name.
#[derive(Clone, Debug, Default)]
pub struct FeatureFilterDiffPolicy {
    ignored: BTreeSet<String>,
    unordered: BTreeSet<String>,
    ignore_outside_content: bool,
}

impl FeatureFilterDiffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave the named feature out of the comparison.
    pub fn ignore_feature(mut self, name: impl Into<String>) -> Self {
        self.ignored.insert(name.into());
        self
    }

    /// Compare the named feature as a multiset even if declared ordered.
    pub fn unordered(mut self, name: impl Into<String>) -> Self {
        self.unordered.insert(name.into());
        self
    }

    /// Ignore references whose target is not reachable from the roots.
    pub fn ignore_references_outside_content(mut self, ignore: bool) -> Self {
        self.ignore_outside_content = ignore;
        self
    }
}

impl<E: ScopeElement> DiffPolicy<E> for FeatureFilterDiffPolicy {
    fn name(&self) -> &str {
        "feature-filter"
    }

    fn covers_feature(
        &self,
        feature: &Feature,
        _first: Role,
        _second: Role,
    ) -> Result<bool, PolicyError> {
        Ok(!self.ignored.contains(&feature.name))
    }

    fn is_ordered(&self, feature: &Feature) -> bool {
        feature.many && feature.ordered && !self.unordered.contains(&feature.name)
    }

    fn ignores_reference(
        &self,
        _holder: &E,
        _feature: &Feature,
        target: &E,
        _role: Role,
        scope: &dyn TreeDataScope<Element = E>,
    ) -> Result<bool, PolicyError> {
        Ok(self.ignore_outside_content && !scope.is_in_content(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_scope::{ElementId, MemoryScope, Schema};

    #[test]
    fn default_policy_uses_declaration() {
        let policy = DefaultDiffPolicy;
        let ordered = Feature::attribute("tags").many(true);
        let single = Feature::attribute("name");
        assert!(DiffPolicy::<u32>::is_ordered(&policy, &ordered));
        assert!(!DiffPolicy::<u32>::is_ordered(&policy, &single));
        assert!(
            DiffPolicy::<u32>::covers_feature(&policy, &single, Role::Target, Role::Reference)
                .unwrap()
        );
    }

    #[test]
    fn filter_policy_ignores_and_unorders() {
        let policy = FeatureFilterDiffPolicy::new()
            .ignore_feature("timestamp")
            .unordered("tags");
        let ts = Feature::attribute("timestamp");
        let tags = Feature::attribute("tags").many(true);
        assert!(
            !DiffPolicy::<u32>::covers_feature(&policy, &ts, Role::Target, Role::Reference)
                .unwrap()
        );
        assert!(!DiffPolicy::<u32>::is_ordered(&policy, &tags));
    }

    #[test]
    fn filter_policy_ignores_references_leaving_content() {
        let schema = Schema::new().with_kind("Cls", vec![Feature::reference("super")]);
        let mut scope = MemoryScope::new("s", schema);
        let a = scope.add_root("Cls");
        let lib = scope.add_detached("Cls");
        let feature = Feature::reference("super");

        let policy = FeatureFilterDiffPolicy::new().ignore_references_outside_content(true);
        let ignored = |target: &ElementId| {
            policy
                .ignores_reference(&a, &feature, target, Role::Target, &scope)
                .unwrap()
        };
        assert!(ignored(&lib));
        assert!(!ignored(&a));
    }
}
