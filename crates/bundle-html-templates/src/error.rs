/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing and evaluation.

use thiserror::Error;

/// Errors that can occur while compiling or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template source could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A name was neither a scope value nor a registered helper.
    #[error("Undefined name: {name}")]
    UndefinedName { name: String },

    /// A helper function reported a failure.
    #[error("Helper '{name}' failed: {message}")]
    Helper { name: String, message: String },

    /// Evaluation failed for any other reason (e.g. unknown method).
    #[error("Evaluation error: {message}")]
    Evaluation { message: String },
}

impl TemplateError {
    /// Create a parse error at the given 1-based line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a helper failure.
    pub fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
