/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template engines for HTML page assembly.
//!
//! Two template families share one expression language and one evaluation
//! [`Scope`]:
//!
//! - Interpolated templates: text with `<%= expr %>` and `<% if ... %>` tags
//! - Indentation markup: `%tag.class#id{attrs}` lines nested by indentation
//!
//! Values follow the truthiness of those languages: only `nil` and `false`
//! are falsy.
//!
//! # Example
//!
//! ```ignore
//! use bundle_html_templates::{ErbEngine, MapScope, TemplateEngine};
//!
//! let mut scope = MapScope::new();
//! scope.insert("title", "Home");
//!
//! let output = ErbEngine.render("<h1><%= title %></h1>", &scope)?;
//! assert_eq!(output, "<h1>Home</h1>");
//! ```

pub mod control;
pub mod engine;
pub mod erb;
pub mod error;
pub mod escape;
pub mod expr;
pub mod haml;
pub mod scope;
pub mod value;

// Re-export main types at crate root
pub use engine::{ErbEngine, HamlEngine, TemplateEngine};
pub use erb::ErbTemplate;
pub use error::{TemplateError, TemplateResult};
pub use escape::escape_html;
pub use haml::HamlTemplate;
pub use scope::{HelperFn, MapScope, Scope};
pub use value::TemplateValue;
