/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Fragment resolution for HTML entries.
 */

//! Fragment resolver.
//!
//! Computes the ordered list of template fragments that make up one HTML
//! document:
//!
//! 1. Deep mode walks `bundle.all_required_bundles()` in the order given.
//!    The bundle itself contributes only the entry being built; every other
//!    bundle contributes its HTML entries for the entry's language, hidden
//!    ones included.
//! 2. Shallow mode considers the entry alone.
//! 3. Composite entries are replaced by their members.
//! 4. Duplicates (by identity) are dropped, keeping the first occurrence.
//! 5. Entries still composite, and HTML entries that are not localized,
//!    are dropped. The entry passed in is never dropped for not being
//!    localized.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{
    BundleRef, EntryFilter, EntryKind, EntryRef, HiddenMode, entry_key, same_bundle, same_entry,
};

/// An ordered, duplicate-free list of renderable fragments.
#[derive(Clone, Default)]
pub struct FragmentList {
    entries: Vec<EntryRef>,
}

impl FragmentList {
    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntryRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filenames of the fragments, in order.
    pub fn filenames(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.filename()).collect()
    }
}

impl<'a> IntoIterator for &'a FragmentList {
    type Item = &'a EntryRef;
    type IntoIter = std::slice::Iter<'a, EntryRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl std::fmt::Debug for FragmentList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.filenames()).finish()
    }
}

/// Resolve the fragments for `entry` of `bundle`.
pub fn resolve(entry: &EntryRef, bundle: &BundleRef, deep: bool) -> FragmentList {
    let contributed: Vec<EntryRef> = if deep {
        let filter = EntryFilter::new(entry.language(), HiddenMode::Include);
        bundle
            .all_required_bundles()
            .iter()
            .flat_map(|required| {
                if same_bundle(required, bundle) {
                    vec![entry.clone()]
                } else {
                    required.entries_for(EntryKind::Html, &filter)
                }
            })
            .collect()
    } else {
        vec![entry.clone()]
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for candidate in contributed.into_iter().flat_map(expand) {
        if !seen.insert(entry_key(&candidate)) {
            continue;
        }
        if candidate.is_composite() {
            debug!(filename = candidate.filename(), "Dropping nested composite");
            continue;
        }
        if candidate.kind() == EntryKind::Html
            && !candidate.is_localized()
            && !same_entry(&candidate, entry)
        {
            debug!(filename = candidate.filename(), "Dropping entry that is not localized");
            continue;
        }
        entries.push(candidate);
    }

    debug!(
        entry = entry.filename(),
        deep,
        fragments = entries.len(),
        "Resolved fragments"
    );
    FragmentList { entries }
}

/// A composite stands for its members; anything else for itself.
fn expand(entry: EntryRef) -> Vec<EntryRef> {
    match entry.composite() {
        Some(members) => members,
        None => vec![entry],
    }
}
