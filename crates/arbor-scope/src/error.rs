/// Errors from scope read and mutation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The element does not belong to the scope.
    #[error("unknown element: {0}")]
    UnknownElement(String),

    /// The feature is not declared for the element's kind.
    #[error("feature '{feature}' is not declared on kind '{kind}'")]
    UnknownFeature { kind: String, feature: String },

    /// More than one value was given to a single-valued feature.
    #[error("feature '{feature}' is single-valued but {count} values were given")]
    TooManyValues { feature: String, count: usize },

    /// The scope rejects mutations.
    #[error("scope '{0}' is read-only")]
    ReadOnly(String),

    /// Removal was refused because other elements still reference the element.
    #[error("element {element} is still referenced {count} time(s)")]
    StillReferenced { element: String, count: usize },

    /// An insertion position is past the end of the list.
    #[error("position {position} out of bounds (len {len})")]
    InvalidPosition { position: usize, len: usize },

    /// The element is already attached somewhere in the tree.
    #[error("element {0} is already attached")]
    AlreadyAttached(String),

    /// The element is not part of the tree.
    #[error("element {0} is not attached")]
    NotAttached(String),

    /// Attaching would make an element contain itself.
    #[error("attaching {0} would create a containment cycle")]
    ContainmentCycle(String),
}

/// Result alias for scope operations.
pub type ScopeResult<T> = Result<T, ScopeError>;
