/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Entry points: build an HTML entry to its build path.
 */

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::context::HtmlContext;
use crate::dispatch::TemplateRegistry;
use crate::error::{BuildError, Result};
use crate::fs::{FileSystem, NativeFileSystem};
use crate::helpers::HelperRegistry;
use crate::model::{BundleRef, EntryRef};
use crate::pipeline::RenderPipeline;
use crate::resolver::{FragmentList, resolve};

/// Builds HTML documents for entries.
///
/// Holds the collaborators a build needs: where files come from and go to,
/// which engine renders which template family, and which helpers
/// templates can call. Each build gets its own [`HtmlContext`].
#[derive(Clone)]
pub struct HtmlBuilder {
    fs: Arc<dyn FileSystem>,
    templates: TemplateRegistry,
    helpers: HelperRegistry,
}

impl HtmlBuilder {
    /// Create a builder over `fs` with the built-in engines and helpers.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            templates: TemplateRegistry::new(),
            helpers: HelperRegistry::new(),
        }
    }

    /// Create a builder over the real file system.
    pub fn native() -> Self {
        Self::new(Arc::new(NativeFileSystem))
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// The fragments a build of `entry` would render.
    pub fn fragments(&self, entry: &EntryRef, bundle: &BundleRef, deep: bool) -> FragmentList {
        resolve(entry, bundle, deep)
    }

    /// Render the document for `entry` without writing it.
    pub fn render_html(&self, entry: &EntryRef, bundle: &BundleRef, deep: bool) -> Result<String> {
        let fragments = resolve(entry, bundle, deep);
        info!(
            entry = entry.filename(),
            bundle = bundle.bundle_name(),
            fragments = fragments.len(),
            "Rendering HTML document"
        );

        let mut context = HtmlContext::new(bundle.as_ref(), entry.language(), &self.helpers);
        RenderPipeline::new(self.fs.as_ref(), &self.templates).build(&fragments, &mut context)
    }

    /// Render the document for `entry` and write it to the entry's build
    /// path. Nothing is written if rendering fails.
    pub fn build_html(&self, entry: &EntryRef, bundle: &BundleRef, deep: bool) -> Result<PathBuf> {
        let html = self.render_html(entry, bundle, deep)?;

        let path = entry.build_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| BuildError::io(parent, e))?;
        }
        self.fs
            .write(path, &html)
            .map_err(|e| BuildError::io(path, e))?;

        info!(path = %path.display(), bytes = html.len(), "Wrote HTML document");
        Ok(path.to_path_buf())
    }

    /// Build a test page: only the entry's own fragments, no required
    /// bundles.
    pub fn build_test(&self, entry: &EntryRef, bundle: &BundleRef) -> Result<PathBuf> {
        self.build_html(entry, bundle, false)
    }
}

impl std::fmt::Debug for HtmlBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlBuilder")
            .field("templates", &self.templates)
            .field("helpers", &self.helpers)
            .finish_non_exhaustive()
    }
}

/// Build `entry` on the real file system with the default engines and
/// helpers.
pub fn build_html(entry: &EntryRef, bundle: &BundleRef, deep: bool) -> Result<PathBuf> {
    HtmlBuilder::native().build_html(entry, bundle, deep)
}

/// Build a test page for `entry` on the real file system.
pub fn build_test(entry: &EntryRef, bundle: &BundleRef) -> Result<PathBuf> {
    HtmlBuilder::native().build_test(entry, bundle)
}
