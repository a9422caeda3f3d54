/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template values.
//!
//! Values follow the truthiness of the template languages they serve: only
//! `nil` and `false` are falsy. An empty string or an empty list is still
//! truthy.

use std::collections::BTreeMap;

/// A value produced or consumed during template evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TemplateValue {
    /// A string value.
    String(String),

    /// An integer value.
    Int(i64),

    /// A boolean value.
    Bool(bool),

    /// A list of values.
    List(Vec<TemplateValue>),

    /// A map of string keys to values. Keys iterate in sorted order.
    Map(BTreeMap<String, TemplateValue>),

    /// The absent value (`nil`).
    #[default]
    Null,
}

impl TemplateValue {
    /// Check if this value counts as true in a condition.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, TemplateValue::Null | TemplateValue::Bool(false))
    }

    /// Render this value as text for output.
    ///
    /// - String: as-is
    /// - Int: decimal
    /// - Bool: "true" / "false"
    /// - List: concatenation of rendered elements
    /// - Map, Null: ""
    pub fn render(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Int(i) => i.to_string(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::List(items) => items.iter().map(TemplateValue::render).collect(),
            TemplateValue::Map(_) | TemplateValue::Null => String::new(),
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TemplateValue::String(_) => "String",
            TemplateValue::Int(_) => "Integer",
            TemplateValue::Bool(_) => "Boolean",
            TemplateValue::List(_) => "Array",
            TemplateValue::Map(_) => "Hash",
            TemplateValue::Null => "nil",
        }
    }

    /// Borrow the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get a field from a map value.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        match self {
            TemplateValue::Map(m) => m.get(key),
            _ => None,
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::String(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::String(value)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        TemplateValue::Bool(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        TemplateValue::Int(value)
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(TemplateValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(TemplateValue::Bool(true).is_truthy());
        assert!(!TemplateValue::Bool(false).is_truthy());
        assert!(!TemplateValue::Null.is_truthy());

        // Empty containers and strings are still truthy
        assert!(TemplateValue::String(String::new()).is_truthy());
        assert!(TemplateValue::List(vec![]).is_truthy());
        assert!(TemplateValue::Map(BTreeMap::new()).is_truthy());
        assert!(TemplateValue::Int(0).is_truthy());
    }

    #[test]
    fn test_render() {
        assert_eq!(TemplateValue::from("abc").render(), "abc");
        assert_eq!(TemplateValue::Int(42).render(), "42");
        assert_eq!(TemplateValue::Bool(false).render(), "false");
        assert_eq!(TemplateValue::Null.render(), "");
        assert_eq!(
            TemplateValue::List(vec!["a".into(), TemplateValue::Int(1)]).render(),
            "a1"
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(TemplateValue::from(None::<&str>), TemplateValue::Null);
        assert_eq!(TemplateValue::from(Some("x")), TemplateValue::from("x"));
    }
}
