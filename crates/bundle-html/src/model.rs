/*
 * model.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Read-only views of the bundle system's entries and bundles.
 */

//! Entry and bundle model.
//!
//! The bundle system owns entries and bundles; this crate only reads them.
//! Both are shared as trait objects behind `Arc`, and identity is the
//! identity of the allocation, never structural equality: two entries with
//! the same filename are still different fragments.

use std::path::Path;
use std::sync::Arc;

/// Shared handle to an entry.
pub type EntryRef = Arc<dyn Entry>;

/// Shared handle to a bundle.
pub type BundleRef = Arc<dyn Bundle>;

/// Kind of build entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    /// HTML-producing template fragment
    #[default]
    Html,
    Javascript,
    Stylesheet,
    Test,
    /// Anything else copied into the build (images, fonts, ...)
    Resource,
}

impl EntryKind {
    /// Get the kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Html => "html",
            EntryKind::Javascript => "javascript",
            EntryKind::Stylesheet => "stylesheet",
            EntryKind::Test => "test",
            EntryKind::Resource => "resource",
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "html" => Ok(EntryKind::Html),
            "javascript" | "js" => Ok(EntryKind::Javascript),
            "stylesheet" | "css" => Ok(EntryKind::Stylesheet),
            "test" => Ok(EntryKind::Test),
            "resource" => Ok(EntryKind::Resource),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build entry: one source file (or a composite of several).
pub trait Entry: Send + Sync {
    /// Logical filename, used in logs and error messages.
    fn filename(&self) -> &str;

    /// Where the template source is read from.
    fn source_path(&self) -> &Path;

    /// Where the built output is written.
    fn build_path(&self) -> &Path;

    /// Language tag, e.g. `en`.
    fn language(&self) -> &str;

    fn kind(&self) -> EntryKind;

    fn is_localized(&self) -> bool;

    fn is_hidden(&self) -> bool;

    /// Members of a composite entry. `None` for ordinary entries; a
    /// composite may have no members.
    fn composite(&self) -> Option<Vec<EntryRef>>;

    fn is_composite(&self) -> bool {
        self.composite().is_some()
    }
}

/// Whether hidden entries take part in an entry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HiddenMode {
    #[default]
    Exclude,
    Include,
}

/// Filter applied by [`Bundle::entries_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub language: String,
    pub hidden: HiddenMode,
}

impl EntryFilter {
    pub fn new(language: impl Into<String>, hidden: HiddenMode) -> Self {
        Self {
            language: language.into(),
            hidden,
        }
    }
}

/// A bundle: a named unit of the application with its own entries.
pub trait Bundle: Send + Sync {
    fn bundle_name(&self) -> &str;

    /// Layout template that wraps every HTML document of this bundle.
    fn layout_path(&self) -> &Path;

    /// This bundle and everything it depends on, in dependency order.
    /// Includes the bundle itself.
    fn all_required_bundles(&self) -> Vec<BundleRef>;

    /// Entries of `kind` matching `filter`.
    fn entries_for(&self, kind: EntryKind, filter: &EntryFilter) -> Vec<EntryRef>;
}

/// Identity comparison for shared entries.
pub fn same_entry(a: &EntryRef, b: &EntryRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Identity comparison for shared bundles.
pub fn same_bundle(a: &BundleRef, b: &BundleRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Address of an entry allocation, usable as a set key.
pub(crate) fn entry_key(entry: &EntryRef) -> usize {
    Arc::as_ptr(entry).cast::<()>() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_names() {
        assert_eq!(EntryKind::try_from("HTML"), Ok(EntryKind::Html));
        assert_eq!(EntryKind::try_from("js"), Ok(EntryKind::Javascript));
        assert!(EntryKind::try_from("video").is_err());
        assert_eq!(EntryKind::Stylesheet.to_string(), "stylesheet");
    }
}
