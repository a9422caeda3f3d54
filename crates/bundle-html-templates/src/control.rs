/*
 * control.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Control statements shared by both template families.
//!
//! Both syntaxes embed the same statement forms (`if`, `unless`, `elsif`,
//! `else`, `end`, or a bare expression evaluated for its side effects) and
//! build the same [`Conditional`] node from them.

use crate::error::TemplateResult;
use crate::expr::{self, Condition, Expr};
use crate::scope::Scope;

/// A classified line of embedded code.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `if cond` / `unless cond`
    If(Condition),
    /// `elsif cond`
    Elsif(Condition),
    /// `else`
    Else,
    /// `end`
    End,
    /// Anything else: evaluated, result discarded.
    Expr(Expr),
}

impl Statement {
    /// Classify a fragment of embedded code.
    pub fn parse(code: &str, line: usize) -> TemplateResult<Statement> {
        let code = code.trim();

        if let Some(rest) = keyword(code, "if") {
            return Ok(Statement::If(condition(rest, false, line)?));
        }
        if let Some(rest) = keyword(code, "unless") {
            return Ok(Statement::If(condition(rest, true, line)?));
        }
        if let Some(rest) = keyword(code, "elsif") {
            return Ok(Statement::Elsif(condition(rest, false, line)?));
        }
        match code {
            "else" => Ok(Statement::Else),
            "end" => Ok(Statement::End),
            _ => Ok(Statement::Expr(expr::parse(code, line)?)),
        }
    }
}

/// Strip a leading keyword followed by whitespace or `(`.
fn keyword<'a>(code: &'a str, kw: &str) -> Option<&'a str> {
    let rest = code.strip_prefix(kw)?;
    if rest.starts_with(char::is_whitespace) || rest.starts_with('(') {
        Some(rest.trim())
    } else {
        None
    }
}

fn condition(source: &str, negated: bool, line: usize) -> TemplateResult<Condition> {
    let source = source.strip_suffix(" then").unwrap_or(source).trim_end();
    Ok(Condition {
        expr: expr::parse(source, line)?,
        negated,
    })
}

/// An `if`/`elsif`/`else` chain over nodes of type `N`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional<N> {
    /// The `if` branch followed by any `elsif` branches.
    pub branches: Vec<(Condition, Vec<N>)>,
    pub else_branch: Option<Vec<N>>,
}

impl<N> Conditional<N> {
    /// Pick the body to render, if any.
    pub fn select(&self, scope: &dyn Scope) -> TemplateResult<Option<&[N]>> {
        for (condition, body) in &self.branches {
            if condition.holds(scope)? {
                return Ok(Some(body));
            }
        }
        Ok(self.else_branch.as_deref())
    }
}
