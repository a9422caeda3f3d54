/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for bundle-html

use std::path::{Path, PathBuf};

use bundle_html_templates::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    /// No template engine is registered for the file's suffix.
    #[error("Unsupported template type: {}", path.display())]
    UnsupportedTemplate { path: PathBuf },

    /// Reading a template or writing the document failed.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template engine failed to compile or render a template.
    #[error("Failed to render {}: {source}", describe(path, filename.as_deref()))]
    Template {
        path: PathBuf,
        /// Filename of the fragment being rendered; `None` for the layout.
        filename: Option<String>,
        #[source]
        source: TemplateError,
    },
}

fn describe(path: &Path, filename: Option<&str>) -> String {
    match filename {
        Some(filename) => format!("{} (fragment {})", path.display(), filename),
        None => format!("{} (layout)", path.display()),
    }
}

impl BuildError {
    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedTemplate { path: path.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn template(path: impl Into<PathBuf>, filename: Option<&str>, source: TemplateError) -> Self {
        Self::Template {
            path: path.into(),
            filename: filename.map(str::to_string),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            BuildError::unsupported("app/layout.txt").to_string(),
            "Unsupported template type: app/layout.txt"
        );

        let err = BuildError::template(
            "app/page.rhtml",
            Some("page.rhtml"),
            TemplateError::parse(3, "unexpected 'end'"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to render app/page.rhtml (fragment page.rhtml): Parse error at line 3: unexpected 'end'"
        );

        let err = BuildError::template(
            "app/layout.rhtml",
            None,
            TemplateError::evaluation("boom"),
        );
        assert!(err.to_string().ends_with("(layout): Evaluation error: boom"));
    }
}
