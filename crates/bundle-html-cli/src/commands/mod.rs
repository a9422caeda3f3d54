//! Command implementations
//!
//! Each command loads the manifest and delegates to `bundle-html`.

pub mod build;
pub mod resolve;
