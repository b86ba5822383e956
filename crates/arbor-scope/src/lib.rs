//! Tree-shaped data scopes for Arbor.
//!
//! A scope is a role-tagged, tree-shaped view over the data being compared.
//! Arbor never loads or persists data itself: adapters expose their model
//! through these traits and the engine reads (and, for merges, edits) it.
//!
//! # Traits
//!
//! - [`TreeDataScope`] -- read-only view: roots, ordered children,
//!   attribute and reference values, feature declarations
//! - [`EditableTreeDataScope`] -- structural mutation used as a merge
//!   destination
//!
//! # Implementations
//!
//! - [`MemoryScope`] -- arena-backed editable scope for tests and embedding
//!
//! # Design Rules
//!
//! 1. Element handles are opaque; only the issuing scope interprets them.
//! 2. Value and child order is significant and must be stable.
//! 3. Scopes are exclusively owned by one comparison while it runs.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{ScopeError, ScopeResult};
pub use memory::{ElementId, MemoryScope, Schema};
pub use traits::{EditableTreeDataScope, ScopeElement, TreeDataScope};
