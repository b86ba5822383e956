//! Features and values carried by scope elements.
//!
//! A [`Feature`] names an attribute (primitive values) or a reference
//! (values that are themselves elements). Containment is not a feature: it
//! is exposed through the scope's children.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Whether a feature holds primitive values or element references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureKind {
    Attribute,
    Reference,
}

/// Declaration of a feature on an element type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name, unique per element type and kind.
    pub name: String,
    /// Attribute or reference.
    pub kind: FeatureKind,
    /// `true` if the feature may hold more than one value.
    pub many: bool,
    /// `true` if the position of values is significant.
    pub ordered: bool,
}

impl Feature {
    /// A single-valued attribute.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Attribute,
            many: false,
            ordered: false,
        }
    }

    /// A single-valued reference.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Reference,
            many: false,
            ordered: false,
        }
    }

    /// Mark the feature as multi-valued, ordered or not.
    pub fn many(mut self, ordered: bool) -> Self {
        self.many = true;
        self.ordered = ordered;
        self
    }

    pub fn is_attribute(&self) -> bool {
        self.kind == FeatureKind::Attribute
    }

    pub fn is_reference(&self) -> bool {
        self.kind == FeatureKind::Reference
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A primitive attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl AttributeValue {
    /// The textual form, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) | Self::Int(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl TryFrom<&serde_json::Value> for AttributeValue {
    type Error = TypeError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| TypeError::UnsupportedValue(n.to_string())),
            other => Err(TypeError::UnsupportedValue(other.to_string())),
        }
    }
}

impl From<&AttributeValue> for serde_json::Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Int(i) => serde_json::Value::from(*i),
            AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Identifier produced by a match policy.
///
/// Two elements denote the same logical element iff their keys are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey(String);

impl MatchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatchKey({})", self.0)
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MatchKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for MatchKey {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&AttributeValue> for MatchKey {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Text(s) => Self(s.clone()),
            other => Self(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_builders() {
        let f = Feature::attribute("tags").many(true);
        assert!(f.is_attribute());
        assert!(f.many);
        assert!(f.ordered);

        let r = Feature::reference("owner");
        assert!(r.is_reference());
        assert!(!r.many);
    }

    #[test]
    fn attribute_value_from_json() {
        assert_eq!(
            AttributeValue::try_from(&json!("x")).unwrap(),
            AttributeValue::Text("x".into())
        );
        assert_eq!(AttributeValue::try_from(&json!(3)).unwrap(), AttributeValue::Int(3));
        assert_eq!(AttributeValue::try_from(&json!(true)).unwrap(), AttributeValue::Bool(true));
        assert!(AttributeValue::try_from(&json!(1.5)).is_err());
        assert!(AttributeValue::try_from(&json!({"a": 1})).is_err());
    }

    #[test]
    fn attribute_value_to_json() {
        let v: serde_json::Value = (&AttributeValue::Int(4)).into();
        assert_eq!(v, json!(4));
    }

    #[test]
    fn match_key_from_text_value_is_unquoted() {
        let key = MatchKey::from(&AttributeValue::from("alpha"));
        assert_eq!(key.as_str(), "alpha");
        let key = MatchKey::from(&AttributeValue::Int(12));
        assert_eq!(key.as_str(), "12");
    }
}
