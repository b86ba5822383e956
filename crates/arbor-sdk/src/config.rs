use serde::{Deserialize, Serialize};

use arbor_diff::DiffOptions;
use arbor_merge::MergeOptions;

use crate::error::ComparisonResult;

/// Configuration of a [`Comparison`](crate::Comparison).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Create completed matches for references leaving the compared
    /// content. When `false` such references are not compared.
    pub complete_references: bool,
    /// Report order-only differences on ordered features.
    pub detect_order_differences: bool,
    /// Allow merging while duplicate match keys exist. Results of such a
    /// merge are best effort.
    pub allow_merge_when_inconsistent: bool,
    /// Bound on nested creation of reference targets during a merge.
    pub max_dependency_depth: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            complete_references: true,
            detect_order_differences: true,
            allow_merge_when_inconsistent: true,
            max_dependency_depth: 64,
        }
    }
}

impl ComparisonConfig {
    /// Refuses merges on inconsistent comparisons and keeps reference
    /// materialization shallow.
    pub fn strict() -> Self {
        Self {
            allow_merge_when_inconsistent: false,
            max_dependency_depth: 8,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ComparisonResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            complete_references: self.complete_references,
            detect_order: self.detect_order_differences,
        }
    }

    pub fn merge_options(&self, update_references: bool) -> MergeOptions {
        MergeOptions {
            update_references,
            max_dependency_depth: self.max_dependency_depth,
        }
    }
}
