/*
 * helpers.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Helper functions available to fragment and layout templates.
 */

//! Template helpers.
//!
//! A [`HelperRegistry`] is one capability object composed from independent
//! helper sets. Each set is a free `register_*` function, so a build can
//! start from [`HelperRegistry::empty`] and pick only what it needs, or add
//! its own helpers on top of [`HelperRegistry::new`].
//!
//! Built-in sets:
//!
//! | set           | helpers                                          |
//! |---------------|--------------------------------------------------|
//! | tag           | `tag(name, attrs = {})`, `content_tag(name, content, attrs = {})` |
//! | text          | `h` / `html_escape`, `truncate(text, length = 30)`, `pluralize(count, singular, plural = nil)` |
//! | compatibility | `render(...)`, which renders nothing              |

use std::collections::HashMap;
use std::sync::Arc;

use bundle_html_templates::{HelperFn, TemplateError, TemplateResult, TemplateValue, escape_html};

/// Default length for `truncate`.
const DEFAULT_TRUNCATE_LENGTH: usize = 30;

/// Named helper functions callable from templates.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, HelperFn>,
}

impl HelperRegistry {
    /// Create a registry with all built-in helper sets.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        register_tag_helpers(&mut registry);
        register_text_helpers(&mut registry);
        register_compatibility_helpers(&mut registry);
        registry
    }

    /// Create a registry with no helpers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a helper, replacing any helper with the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[TemplateValue]) -> TemplateResult<TemplateValue> + Send + Sync + 'static,
    ) -> &mut Self {
        self.helpers.insert(name.into(), Arc::new(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Registered helper names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Call a helper. Returns `None` if no helper has that name.
    pub fn call(&self, name: &str, args: &[TemplateValue]) -> Option<TemplateResult<TemplateValue>> {
        self.helpers.get(name).map(|f| f(args))
    }
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.names())
            .finish()
    }
}

fn string_arg(helper: &str, args: &[TemplateValue], index: usize) -> TemplateResult<String> {
    args.get(index)
        .map(TemplateValue::render)
        .ok_or_else(|| TemplateError::helper(helper, format!("missing argument {}", index + 1)))
}

fn attributes_arg(helper: &str, args: &[TemplateValue], index: usize) -> TemplateResult<String> {
    match args.get(index) {
        None | Some(TemplateValue::Null) => Ok(String::new()),
        Some(TemplateValue::Map(map)) => {
            let mut out = String::new();
            for (name, value) in map {
                match value {
                    TemplateValue::Null | TemplateValue::Bool(false) => {}
                    TemplateValue::Bool(true) => {
                        out.push_str(&format!(" {}=\"{}\"", name, name));
                    }
                    other => {
                        out.push_str(&format!(" {}=\"{}\"", name, escape_html(&other.render())));
                    }
                }
            }
            Ok(out)
        }
        Some(other) => Err(TemplateError::helper(
            helper,
            format!("attributes must be a Hash, got {}", other.type_name()),
        )),
    }
}

/// `tag` and `content_tag`.
///
/// Attribute values are escaped and sorted by name; `true` repeats the
/// name (`disabled="disabled"`). Content passed to `content_tag` is
/// inserted as-is.
pub fn register_tag_helpers(registry: &mut HelperRegistry) {
    registry
        .register("tag", |args| {
            let name = string_arg("tag", args, 0)?;
            let attributes = attributes_arg("tag", args, 1)?;
            Ok(TemplateValue::String(format!("<{}{} />", name, attributes)))
        })
        .register("content_tag", |args| {
            let name = string_arg("content_tag", args, 0)?;
            let content = args.get(1).map(TemplateValue::render).unwrap_or_default();
            let attributes = attributes_arg("content_tag", args, 2)?;
            Ok(TemplateValue::String(format!(
                "<{}{}>{}</{}>",
                name, attributes, content, name
            )))
        });
}

/// `h` / `html_escape`, `truncate` and `pluralize`.
pub fn register_text_helpers(registry: &mut HelperRegistry) {
    let escape = |args: &[TemplateValue]| -> TemplateResult<TemplateValue> {
        let text = args.first().map(TemplateValue::render).unwrap_or_default();
        Ok(TemplateValue::String(escape_html(&text)))
    };

    registry
        .register("h", escape)
        .register("html_escape", escape)
        .register("truncate", |args| {
            let text = string_arg("truncate", args, 0)?;
            let length = match args.get(1) {
                None | Some(TemplateValue::Null) => DEFAULT_TRUNCATE_LENGTH,
                Some(TemplateValue::Int(n)) => usize::try_from(*n).map_err(|_| {
                    TemplateError::helper("truncate", "length must not be negative")
                })?,
                Some(other) => {
                    return Err(TemplateError::helper(
                        "truncate",
                        format!("length must be an Integer, got {}", other.type_name()),
                    ));
                }
            };
            Ok(TemplateValue::String(truncate(&text, length)))
        })
        .register("pluralize", |args| {
            let count = match args.first() {
                Some(TemplateValue::Int(n)) => *n,
                None | Some(TemplateValue::Null) => 0,
                Some(other) => {
                    return Err(TemplateError::helper(
                        "pluralize",
                        format!("count must be an Integer, got {}", other.type_name()),
                    ));
                }
            };
            let singular = string_arg("pluralize", args, 1)?;
            let word = if count == 1 {
                singular
            } else {
                match args.get(2) {
                    Some(plural) if plural.is_truthy() => plural.render(),
                    _ => format!("{}s", singular),
                }
            };
            Ok(TemplateValue::String(format!("{} {}", count, word)))
        });
}

/// Shorten `text` to at most `length` characters, ending in `...`.
fn truncate(text: &str, length: usize) -> String {
    const OMISSION: &str = "...";
    if text.chars().count() <= length {
        return text.to_string();
    }
    let keep = length.saturating_sub(OMISSION.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&OMISSION[..length.min(OMISSION.len())]);
    out
}

/// `render`, kept so templates written for partial rendering still
/// compile. It always produces an empty string.
pub fn register_compatibility_helpers(registry: &mut HelperRegistry) {
    registry.register("render", |_| Ok(TemplateValue::String(String::new())));
}
