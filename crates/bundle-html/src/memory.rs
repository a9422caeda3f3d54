/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * In-memory entry and bundle implementations.
 */

//! In-memory [`Entry`] and [`Bundle`] implementations.
//!
//! Useful when the bundle graph is described by data (a manifest) rather
//! than discovered by a full build system, and in tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::model::{Bundle, BundleRef, Entry, EntryFilter, EntryKind, EntryRef, HiddenMode};

/// An entry whose properties are fixed at construction.
#[derive(Clone)]
pub struct MemoryEntry {
    filename: String,
    source_path: PathBuf,
    build_path: PathBuf,
    language: String,
    kind: EntryKind,
    localized: bool,
    hidden: bool,
    members: Option<Vec<EntryRef>>,
}

impl MemoryEntry {
    /// Create an HTML entry for `source_path`.
    ///
    /// Defaults: built next to its source, language `en`, not localized,
    /// not hidden, not composite.
    pub fn new(filename: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        Self {
            filename: filename.into(),
            build_path: source_path.clone(),
            source_path,
            language: "en".to_string(),
            kind: EntryKind::Html,
            localized: false,
            hidden: false,
            members: None,
        }
    }

    /// Create a composite entry standing in for `members`.
    pub fn new_composite(filename: impl Into<String>, members: Vec<EntryRef>) -> Self {
        let filename = filename.into();
        let mut entry = Self::new(filename.clone(), filename);
        entry.members = Some(members);
        entry
    }

    pub fn with_build_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_path = path.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn localized(mut self, localized: bool) -> Self {
        self.localized = localized;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Wrap in a shared handle.
    pub fn into_ref(self) -> EntryRef {
        Arc::new(self)
    }
}

impl Entry for MemoryEntry {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn build_path(&self) -> &Path {
        &self.build_path
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn kind(&self) -> EntryKind {
        self.kind
    }

    fn is_localized(&self) -> bool {
        self.localized
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn composite(&self) -> Option<Vec<EntryRef>> {
        self.members.clone()
    }
}

impl std::fmt::Debug for MemoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEntry")
            .field("filename", &self.filename)
            .field("source_path", &self.source_path)
            .field("language", &self.language)
            .field("kind", &self.kind)
            .field("localized", &self.localized)
            .field("hidden", &self.hidden)
            .field("members", &self.members.as_ref().map(Vec::len))
            .finish()
    }
}

/// A bundle with a fixed entry list and fixed requirements.
///
/// Bundles are created behind an `Arc` so that
/// [`Bundle::all_required_bundles`] can hand out the bundle itself.
pub struct MemoryBundle {
    this: Weak<MemoryBundle>,
    name: String,
    layout_path: PathBuf,
    requires: Vec<BundleRef>,
    entries: Vec<EntryRef>,
}

impl MemoryBundle {
    /// Create a bundle. `requires` lists direct requirements in order.
    pub fn new(
        name: impl Into<String>,
        layout_path: impl Into<PathBuf>,
        requires: Vec<BundleRef>,
        entries: Vec<EntryRef>,
    ) -> Arc<Self> {
        let name = name.into();
        let layout_path = layout_path.into();
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            name,
            layout_path,
            requires,
            entries,
        })
    }

    /// All entries of the bundle, unfiltered.
    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    /// Direct requirements.
    pub fn requires(&self) -> &[BundleRef] {
        &self.requires
    }
}

impl Bundle for MemoryBundle {
    fn bundle_name(&self) -> &str {
        &self.name
    }

    fn layout_path(&self) -> &Path {
        &self.layout_path
    }

    /// The bundle itself, then each requirement's own list in declaration
    /// order, keeping the first occurrence of each bundle.
    fn all_required_bundles(&self) -> Vec<BundleRef> {
        let mut bundles: Vec<BundleRef> = Vec::new();
        if let Some(this) = self.this.upgrade() {
            bundles.push(this);
        }
        for required in &self.requires {
            for bundle in required.all_required_bundles() {
                if !bundles.iter().any(|b| crate::model::same_bundle(b, &bundle)) {
                    bundles.push(bundle);
                }
            }
        }
        bundles
    }

    /// Entries of `kind` for the filter's language. Entries that are not
    /// localized are shared by every language.
    fn entries_for(&self, kind: EntryKind, filter: &EntryFilter) -> Vec<EntryRef> {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == kind)
            .filter(|entry| !entry.is_localized() || entry.language() == filter.language)
            .filter(|entry| filter.hidden == HiddenMode::Include || !entry.is_hidden())
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for MemoryBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let requires: Vec<&str> = self.requires.iter().map(|b| b.bundle_name()).collect();
        f.debug_struct("MemoryBundle")
            .field("name", &self.name)
            .field("layout_path", &self.layout_path)
            .field("requires", &requires)
            .field("entries", &self.entries.len())
            .finish()
    }
}
