/*
 * dispatch.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Template dispatch by file suffix.
 */

//! Template dispatcher.
//!
//! A template's family is decided by its file suffix alone, using the
//! [`TEMPLATE_SUFFIXES`] table. The [`TemplateRegistry`] maps each family to
//! the engine that renders it. Adding a family means adding one
//! [`TemplateKind`] variant and its suffixes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bundle_html_templates::{ErbEngine, HamlEngine, Scope, TemplateEngine};
use tracing::debug;

use crate::error::{BuildError, Result};

/// Supported template families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Text with embedded `<%= %>` tags.
    Interpolated,
    /// Indentation-structured markup.
    IndentedMarkup,
}

/// Suffix table, checked in order. Matching is case-sensitive.
pub const TEMPLATE_SUFFIXES: &[(&str, TemplateKind)] = &[
    (".rhtml", TemplateKind::Interpolated),
    (".html.erb", TemplateKind::Interpolated),
    (".haml", TemplateKind::IndentedMarkup),
    (".html.haml", TemplateKind::IndentedMarkup),
];

impl TemplateKind {
    /// Detect the template family of `path` from its file name.
    pub fn detect(path: &Path) -> Option<TemplateKind> {
        let name = path.file_name()?.to_str()?;
        TEMPLATE_SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Interpolated => "interpolated",
            TemplateKind::IndentedMarkup => "indented-markup",
        }
    }
}

/// Engines for each template family.
#[derive(Clone)]
pub struct TemplateRegistry {
    engines: HashMap<TemplateKind, Arc<dyn TemplateEngine>>,
}

impl TemplateRegistry {
    /// Create a registry with the built-in engines.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(TemplateKind::Interpolated, Arc::new(ErbEngine));
        registry.register(TemplateKind::IndentedMarkup, Arc::new(HamlEngine));
        registry
    }

    /// Create a registry with no engines.
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Register the engine for a family, replacing any previous one.
    pub fn register(&mut self, kind: TemplateKind, engine: Arc<dyn TemplateEngine>) {
        self.engines.insert(kind, engine);
    }

    pub fn get(&self, kind: TemplateKind) -> Option<&Arc<dyn TemplateEngine>> {
        self.engines.get(&kind)
    }

    /// The engine for `path`.
    ///
    /// Fails with [`BuildError::UnsupportedTemplate`] when the suffix is
    /// unknown or no engine is registered for its family.
    pub fn engine_for(&self, path: &Path) -> Result<&Arc<dyn TemplateEngine>> {
        TemplateKind::detect(path)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| BuildError::unsupported(path))
    }

    /// Render `source`, read from `path`, against `scope`.
    ///
    /// `filename` names the fragment for error reporting (`None` for a
    /// layout).
    pub fn render(
        &self,
        path: &Path,
        filename: Option<&str>,
        source: &str,
        scope: &dyn Scope,
    ) -> Result<String> {
        let engine = self.engine_for(path)?;
        debug!(engine = engine.name(), path = %path.display(), "Rendering template");
        engine
            .render(source, scope)
            .map_err(|e| BuildError::template(path, filename, e))
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut engines: Vec<(&str, &str)> = self
            .engines
            .iter()
            .map(|(kind, engine)| (kind.as_str(), engine.name()))
            .collect();
        engines.sort_unstable();
        f.debug_struct("TemplateRegistry")
            .field("engines", &engines)
            .finish()
    }
}
