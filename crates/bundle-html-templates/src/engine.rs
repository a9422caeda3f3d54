/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * TemplateEngine trait and the two built-in engines.
 */

//! Template engines.

use crate::erb::ErbTemplate;
use crate::error::TemplateResult;
use crate::haml::HamlTemplate;
use crate::scope::Scope;

/// A template family that turns source text plus a scope into output.
///
/// Engines are stateless: each call compiles and renders one source.
///
/// # Thread Safety
///
/// Engines must be `Send + Sync` so a registry holding them can be shared.
///
/// # Example
///
/// ```ignore
/// use bundle_html_templates::{Scope, TemplateEngine, TemplateResult};
///
/// struct Verbatim;
///
/// impl TemplateEngine for Verbatim {
///     fn name(&self) -> &str {
///         "verbatim"
///     }
///
///     fn render(&self, source: &str, _scope: &dyn Scope) -> TemplateResult<String> {
///         Ok(source.to_string())
///     }
/// }
/// ```
pub trait TemplateEngine: Send + Sync {
    /// Human-readable name, used in log messages.
    fn name(&self) -> &str;

    /// Compile `source` and render it against `scope`.
    fn render(&self, source: &str, scope: &dyn Scope) -> TemplateResult<String>;
}

/// Engine for interpolated templates (`<%= %>` tags).
#[derive(Debug, Default, Clone, Copy)]
pub struct ErbEngine;

impl TemplateEngine for ErbEngine {
    fn name(&self) -> &str {
        "erb"
    }

    fn render(&self, source: &str, scope: &dyn Scope) -> TemplateResult<String> {
        ErbTemplate::compile(source)?.render(scope)
    }
}

/// Engine for indentation-markup templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct HamlEngine;

impl TemplateEngine for HamlEngine {
    fn name(&self) -> &str {
        "haml"
    }

    fn render(&self, source: &str, scope: &dyn Scope) -> TemplateResult<String> {
        HamlTemplate::compile(source)?.render(scope)
    }
}
