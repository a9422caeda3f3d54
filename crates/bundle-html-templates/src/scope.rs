/*
 * scope.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation scope.
//!
//! A [`Scope`] is everything a template can see: named values (plain names
//! and `@names` resolve through the same lookup) and helper functions. Both
//! template families evaluate against the same trait, so a helper or value
//! is reachable from either syntax.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TemplateResult;
use crate::value::TemplateValue;

/// A helper function callable from templates.
pub type HelperFn = Arc<dyn Fn(&[TemplateValue]) -> TemplateResult<TemplateValue> + Send + Sync>;

/// The names and helpers visible to a template during rendering.
pub trait Scope {
    /// Look up a named value. `@name` references are looked up without the `@`.
    fn lookup(&self, name: &str) -> Option<TemplateValue>;

    /// Call a helper by name.
    ///
    /// Returns `None` if no helper with that name exists.
    fn call(&self, name: &str, args: &[TemplateValue]) -> Option<TemplateResult<TemplateValue>>;
}

/// A scope backed by plain maps.
///
/// Useful for tests and for rendering templates outside of a build.
#[derive(Clone, Default)]
pub struct MapScope {
    values: HashMap<String, TemplateValue>,
    helpers: HashMap<String, HelperFn>,
}

impl MapScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Register a helper function.
    pub fn helper(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[TemplateValue]) -> TemplateResult<TemplateValue> + Send + Sync + 'static,
    ) -> &mut Self {
        self.helpers.insert(name.into(), Arc::new(f));
        self
    }
}

impl Scope for MapScope {
    fn lookup(&self, name: &str) -> Option<TemplateValue> {
        self.values.get(name).cloned()
    }

    fn call(&self, name: &str, args: &[TemplateValue]) -> Option<TemplateResult<TemplateValue>> {
        self.helpers.get(name).map(|f| f(args))
    }
}

impl std::fmt::Debug for MapScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut helpers: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        helpers.sort_unstable();
        f.debug_struct("MapScope")
            .field("values", &self.values)
            .field("helpers", &helpers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_scope_lookup_and_call() {
        let mut scope = MapScope::new();
        scope
            .insert("title", "Home")
            .helper("shout", |args| {
                Ok(TemplateValue::String(
                    args.first().map(TemplateValue::render).unwrap_or_default().to_uppercase(),
                ))
            });

        assert_eq!(scope.lookup("title"), Some(TemplateValue::from("Home")));
        assert_eq!(scope.lookup("missing"), None);

        let shouted = scope.call("shout", &["hi".into()]).unwrap().unwrap();
        assert_eq!(shouted, TemplateValue::from("HI"));
        assert!(scope.call("missing", &[]).is_none());
    }
}
