/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML page assembly for multi-bundle web application builds.
//!
//! Given an HTML entry and the bundle it belongs to, this crate:
//!
//! 1. Resolves the ordered, duplicate-free list of template fragments to
//!    render, pulling fragments from every bundle the entry's bundle
//!    requires ([`resolve`])
//! 2. Renders each fragment into a buffer, then renders the bundle's layout
//!    with that buffer exposed as `content_for_resources`
//!    ([`RenderPipeline`])
//! 3. Writes the document to the entry's build path ([`HtmlBuilder`])
//!
//! Template families are picked by file suffix ([`TemplateKind`]) and
//! rendered by the engines in `bundle-html-templates`.
//!
//! # Example
//!
//! ```ignore
//! use bundle_html::{HtmlBuilder, MemoryBundle, MemoryEntry};
//!
//! let entry = MemoryEntry::new("index.rhtml", "apps/app/index.rhtml")
//!     .with_build_path("build/app/en/index.html")
//!     .localized(true)
//!     .into_ref();
//! let bundle = MemoryBundle::new("app", "apps/app/layout.rhtml", vec![], vec![entry.clone()]);
//!
//! let written = HtmlBuilder::native().build_html(&entry, &(bundle as _), true)?;
//! ```

pub mod build;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod helpers;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod resolver;

pub use build::{HtmlBuilder, build_html, build_test};
pub use context::{FragmentScope, HtmlContext, RenderBuffer};
pub use dispatch::{TEMPLATE_SUFFIXES, TemplateKind, TemplateRegistry};
pub use error::{BuildError, Result};
pub use fs::{FileSystem, MemoryFileSystem, NativeFileSystem};
pub use helpers::HelperRegistry;
pub use memory::{MemoryBundle, MemoryEntry};
pub use model::{
    Bundle, BundleRef, Entry, EntryFilter, EntryKind, EntryRef, HiddenMode, same_bundle,
    same_entry,
};
pub use pipeline::RenderPipeline;
pub use resolver::{FragmentList, resolve};
