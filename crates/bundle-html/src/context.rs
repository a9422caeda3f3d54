/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-build evaluation context for HTML documents.
 */

//! Render context.
//!
//! One [`HtmlContext`] exists per build call. It is the [`Scope`] both
//! fragment and layout templates evaluate against. While a fragment is
//! rendered the context knows which entry that is; the [`FragmentScope`]
//! guard returned by [`HtmlContext::enter`] bounds that period and puts the
//! context back to idle when dropped, whatever happened in between.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use bundle_html_templates::{Scope, TemplateResult, TemplateValue};
use tracing::trace;

use crate::helpers::HelperRegistry;
use crate::model::{Bundle, EntryRef};

/// Accumulates rendered fragment output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBuffer {
    content: String,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

/// Evaluation context for one HTML build.
///
/// Names visible to templates:
///
/// - `bundle_name`, `language`, `layout_path`
/// - `filename` and `current_entry` (a hash of the entry's properties)
///   while a fragment renders, `nil` otherwise
/// - `content_for_resources`: the rendered fragments, during the layout
///   phase only
///
/// Every name is also reachable as `@name`. Helper calls go to the
/// context's [`HelperRegistry`].
pub struct HtmlContext<'a> {
    bundle_name: String,
    language: String,
    layout_path: PathBuf,
    helpers: &'a HelperRegistry,
    current: Option<EntryRef>,
    content_for_resources: Option<String>,
}

impl<'a> HtmlContext<'a> {
    /// Create an idle context for building a document of `bundle` in
    /// `language`.
    pub fn new(bundle: &dyn Bundle, language: impl Into<String>, helpers: &'a HelperRegistry) -> Self {
        Self {
            bundle_name: bundle.bundle_name().to_string(),
            language: language.into(),
            layout_path: bundle.layout_path().to_path_buf(),
            helpers,
            current: None,
            content_for_resources: None,
        }
    }

    pub fn bundle_name(&self) -> &str {
        &self.bundle_name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn layout_path(&self) -> &Path {
        &self.layout_path
    }

    /// The fragment being rendered, if any.
    pub fn current_entry(&self) -> Option<&EntryRef> {
        self.current.as_ref()
    }

    /// True when no fragment is being rendered.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn content_for_resources(&self) -> Option<&str> {
        self.content_for_resources.as_deref()
    }

    /// Expose the rendered fragments to the layout.
    pub fn set_content_for_resources(&mut self, content: impl Into<String>) {
        self.content_for_resources = Some(content.into());
    }

    /// Start rendering `entry`. The context is idle again once the returned
    /// guard is dropped.
    pub fn enter(&mut self, entry: EntryRef) -> FragmentScope<'_, 'a> {
        trace!(filename = entry.filename(), "Entering fragment");
        self.current = Some(entry);
        FragmentScope { context: self }
    }

    fn entry_value(entry: &EntryRef) -> TemplateValue {
        let mut map = BTreeMap::new();
        map.insert("filename".to_string(), entry.filename().into());
        map.insert(
            "source_path".to_string(),
            entry.source_path().display().to_string().into(),
        );
        map.insert(
            "build_path".to_string(),
            entry.build_path().display().to_string().into(),
        );
        map.insert("language".to_string(), entry.language().into());
        map.insert("kind".to_string(), entry.kind().as_str().into());
        map.insert("localized".to_string(), entry.is_localized().into());
        map.insert("hidden".to_string(), entry.is_hidden().into());
        TemplateValue::Map(map)
    }
}

impl Scope for HtmlContext<'_> {
    fn lookup(&self, name: &str) -> Option<TemplateValue> {
        let value = match name {
            "bundle_name" => self.bundle_name.as_str().into(),
            "language" => self.language.as_str().into(),
            "layout_path" => self.layout_path.display().to_string().into(),
            "filename" => self.current.as_ref().map(|e| e.filename()).into(),
            "current_entry" => self
                .current
                .as_ref()
                .map_or(TemplateValue::Null, Self::entry_value),
            "content_for_resources" => self.content_for_resources.as_deref().into(),
            _ => return None,
        };
        Some(value)
    }

    fn call(&self, name: &str, args: &[TemplateValue]) -> Option<TemplateResult<TemplateValue>> {
        self.helpers.call(name, args)
    }
}

impl std::fmt::Debug for HtmlContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlContext")
            .field("bundle_name", &self.bundle_name)
            .field("language", &self.language)
            .field("layout_path", &self.layout_path)
            .field("current", &self.current.as_ref().map(|e| e.filename()))
            .field(
                "content_for_resources",
                &self.content_for_resources.as_ref().map(String::len),
            )
            .finish()
    }
}

/// Guard for the rendering of one fragment.
///
/// Dereferences to the context so it can be used as the render scope.
pub struct FragmentScope<'c, 'a> {
    context: &'c mut HtmlContext<'a>,
}

impl<'a> Deref for FragmentScope<'_, 'a> {
    type Target = HtmlContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl Drop for FragmentScope<'_, '_> {
    fn drop(&mut self) {
        if let Some(entry) = self.context.current.take() {
            trace!(filename = entry.filename(), "Leaving fragment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBundle, MemoryEntry};
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn bundle() -> std::sync::Arc<MemoryBundle> {
        MemoryBundle::new("sample", "apps/sample/layout.rhtml", vec![], vec![])
    }

    #[test]
    fn test_render_buffer() {
        let mut buffer = RenderBuffer::new();
        assert!(buffer.is_empty());
        buffer.push_str("<p>a</p>");
        buffer.push_str("<p>b</p>");
        assert_eq!(buffer.as_str(), "<p>a</p><p>b</p>");
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.into_string(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_scope_restores_idle_on_drop() {
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let entry = MemoryEntry::new("page.rhtml", "apps/sample/page.rhtml").into_ref();

        assert!(context.is_idle());
        {
            let scope = context.enter(entry);
            assert!(!scope.is_idle());
            assert_eq!(scope.lookup("filename"), Some(TemplateValue::from("page.rhtml")));
        }
        assert!(context.is_idle());
        assert_eq!(context.lookup("filename"), Some(TemplateValue::Null));
    }

    #[test]
    fn test_scope_restores_idle_on_panic() {
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let mut context = HtmlContext::new(&*bundle, "en", &helpers);
        let entry = MemoryEntry::new("page.rhtml", "apps/sample/page.rhtml").into_ref();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = context.enter(entry);
            panic!("template blew up");
        }));
        assert!(result.is_err());
        assert!(context.is_idle());
    }

    #[test]
    fn test_context_names() {
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let mut context = HtmlContext::new(&*bundle, "fr", &helpers);

        assert_eq!(context.lookup("bundle_name"), Some(TemplateValue::from("sample")));
        assert_eq!(context.lookup("language"), Some(TemplateValue::from("fr")));
        assert_eq!(context.lookup("content_for_resources"), Some(TemplateValue::Null));
        assert_eq!(context.lookup("unknown"), None);

        context.set_content_for_resources("<p>x</p>");
        assert_eq!(
            context.lookup("content_for_resources"),
            Some(TemplateValue::from("<p>x</p>"))
        );

        let entry = MemoryEntry::new("page.rhtml", "apps/sample/page.rhtml")
            .localized(true)
            .into_ref();
        let scope = context.enter(entry);
        let current = scope.lookup("current_entry").unwrap();
        assert_eq!(current.get("filename"), Some(&TemplateValue::from("page.rhtml")));
        assert_eq!(current.get("kind"), Some(&TemplateValue::from("html")));
        assert_eq!(current.get("localized"), Some(&TemplateValue::Bool(true)));
    }

    #[test]
    fn test_helpers_are_callable() {
        let helpers = HelperRegistry::new();
        let bundle = bundle();
        let context = HtmlContext::new(&*bundle, "en", &helpers);

        let escaped = context.call("h", &["<b>".into()]).unwrap().unwrap();
        assert_eq!(escaped, TemplateValue::from("&lt;b&gt;"));
        assert!(context.call("no_such_helper", &[]).is_none());
    }
}
