/*
 * pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Two-phase render pipeline: fragments, then layout.
 */

//! Render pipeline.
//!
//! Phase one renders every fragment, in order, into a [`RenderBuffer`].
//! Phase two renders the bundle's layout with that buffer exposed as
//! `content_for_resources`. A fragment whose source is the layout itself
//! contributes nothing.
//!
//! The pipeline fails fast: the first error aborts the build.

use std::path::Path;

use tracing::debug;

use crate::context::{HtmlContext, RenderBuffer};
use crate::dispatch::TemplateRegistry;
use crate::error::{BuildError, Result};
use crate::fs::FileSystem;
use crate::model::EntryRef;
use crate::resolver::FragmentList;

pub struct RenderPipeline<'a> {
    fs: &'a dyn FileSystem,
    templates: &'a TemplateRegistry,
}

impl<'a> RenderPipeline<'a> {
    pub fn new(fs: &'a dyn FileSystem, templates: &'a TemplateRegistry) -> Self {
        Self { fs, templates }
    }

    /// Render `fragments` and wrap them in the layout.
    pub fn build(&self, fragments: &FragmentList, context: &mut HtmlContext<'_>) -> Result<String> {
        let mut buffer = RenderBuffer::new();
        for entry in fragments {
            self.render_fragment(entry, context, &mut buffer)?;
        }

        let layout = context.layout_path().to_path_buf();
        debug!(
            layout = %layout.display(),
            bytes = buffer.len(),
            "Rendering layout"
        );
        context.set_content_for_resources(buffer.into_string());

        self.templates.engine_for(&layout)?;
        let source = self.read(&layout)?;
        self.templates.render(&layout, None, &source, &*context)
    }

    /// Render one fragment and append its output to `buffer`.
    ///
    /// The context is idle again when this returns, on success or failure.
    pub fn render_fragment(
        &self,
        entry: &EntryRef,
        context: &mut HtmlContext<'_>,
        buffer: &mut RenderBuffer,
    ) -> Result<()> {
        let scope = context.enter(entry.clone());
        let path = entry.source_path();

        if path == scope.layout_path() {
            debug!(filename = entry.filename(), "Skipping the layout as a fragment");
            return Ok(());
        }

        debug!(filename = entry.filename(), path = %path.display(), "Rendering fragment");
        self.templates.engine_for(path)?;
        let source = self.read(path)?;
        let output = self
            .templates
            .render(path, Some(entry.filename()), &source, &*scope)?;
        buffer.push_str(&output);
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.fs
            .read_to_string(path)
            .map_err(|e| BuildError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::helpers::HelperRegistry;
    use crate::memory::{MemoryBundle, MemoryEntry};
    use crate::model::BundleRef;
    use crate::resolver::resolve;
    use pretty_assertions::assert_eq;

    const LAYOUT: &str = "app/layout.rhtml";

    fn bundle() -> BundleRef {
        MemoryBundle::new("app", LAYOUT, vec![], vec![])
    }

    #[test]
    fn test_fragments_render_in_order_into_layout() {
        let fs = MemoryFileSystem::new()
            .with_file("app/a.rhtml", "<p>a</p>\n")
            .with_file("app/b.haml", "%p= filename\n")
            .with_file(LAYOUT, "<body>\n<%= @content_for_resources %></body>\n");
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let a = MemoryEntry::new("a.rhtml", "app/a.rhtml").localized(true).into_ref();
        let b = MemoryEntry::new("b.haml", "app/b.haml").localized(true).into_ref();
        let group = MemoryEntry::new_composite("group", vec![a, b]).into_ref();

        let fragments = resolve(&group, &bundle, false);
        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let html = RenderPipeline::new(&fs, &templates)
            .build(&fragments, &mut context)
            .unwrap();

        assert_eq!(html, "<body>\n<p>a</p>\n<p>b.haml</p>\n</body>\n");
        assert!(context.is_idle());
    }

    #[test]
    fn test_layout_fragment_is_skipped() {
        let fs = MemoryFileSystem::new().with_file(LAYOUT, "[<%= content_for_resources %>]");
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let layout_entry = MemoryEntry::new("layout.rhtml", LAYOUT).into_ref();

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let mut buffer = RenderBuffer::new();
        let pipeline = RenderPipeline::new(&fs, &templates);
        pipeline
            .render_fragment(&layout_entry, &mut context, &mut buffer)
            .unwrap();
        assert!(buffer.is_empty());

        let fragments = resolve(&layout_entry, &bundle, false);
        assert_eq!(pipeline.build(&fragments, &mut context).unwrap(), "[]");
    }

    #[test]
    fn test_failed_fragment_leaves_context_idle() {
        let fs = MemoryFileSystem::new().with_file("app/bad.rhtml", "<%= missing %>");
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let bad = MemoryEntry::new("bad.rhtml", "app/bad.rhtml").into_ref();

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let mut buffer = RenderBuffer::new();
        let err = RenderPipeline::new(&fs, &templates)
            .render_fragment(&bad, &mut context, &mut buffer)
            .unwrap_err();

        assert!(matches!(err, BuildError::Template { filename: Some(ref f), .. } if f == "bad.rhtml"));
        assert!(context.is_idle());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_missing_fragment_source_is_io_error() {
        let fs = MemoryFileSystem::new();
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let entry = MemoryEntry::new("gone.rhtml", "app/gone.rhtml").into_ref();

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let err = RenderPipeline::new(&fs, &templates)
            .build(&resolve(&entry, &bundle, false), &mut context)
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
        assert!(context.is_idle());
    }

    #[test]
    fn test_layout_failure_is_reported_without_fragment() {
        let fs = MemoryFileSystem::new().with_file(LAYOUT, "<% if x %>");
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let err = RenderPipeline::new(&fs, &templates)
            .build(&FragmentList::default(), &mut context)
            .unwrap_err();
        match err {
            BuildError::Template { path, filename, .. } => {
                assert_eq!(path, Path::new(LAYOUT));
                assert_eq!(filename, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_layout_is_detected_before_reading() {
        let fs = MemoryFileSystem::new();
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle: BundleRef = MemoryBundle::new("app", "app/layout.txt", vec![], vec![]);

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let err = RenderPipeline::new(&fs, &templates)
            .build(&FragmentList::default(), &mut context)
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedTemplate { ref path } if path == Path::new("app/layout.txt")));
    }

    #[test]
    fn test_unsupported_fragment_type() {
        let fs = MemoryFileSystem::new().with_file("app/notes.txt", "notes");
        let templates = TemplateRegistry::new();
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let entry = MemoryEntry::new("notes.txt", "app/notes.txt").into_ref();

        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let err = RenderPipeline::new(&fs, &templates)
            .build(&resolve(&entry, &bundle, false), &mut context)
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedTemplate { .. }));
    }
}
