/*
 * erb.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Interpolated templates (`.rhtml`, `.html.erb`).
//!
//! Text with embedded tags:
//!
//! - `<%= expr %>` inserts the rendered value (not escaped)
//! - `<% code %>` runs a statement (`if`, `unless`, `elsif`, `else`, `end`,
//!   or an expression whose value is discarded)
//! - `<%# comment %>` is dropped
//! - `<%%` produces a literal `<%`
//! - `<%-` strips whitespace before the tag, `-%>` swallows the next newline
//!
//! A statement or comment tag that is alone on its line takes its
//! indentation and line break with it, so control flow does not leave
//! blank lines behind.

use crate::control::{Conditional, Statement};
use crate::error::{TemplateError, TemplateResult};
use crate::expr::{self, Condition, Expr};
use crate::scope::Scope;

/// A node of a compiled interpolated template.
#[derive(Debug, Clone, PartialEq)]
pub enum ErbNode {
    Text(String),
    Output(Expr),
    Code(Expr),
    Conditional(Conditional<ErbNode>),
}

/// A compiled interpolated template.
#[derive(Debug, Clone, PartialEq)]
pub struct ErbTemplate {
    pub nodes: Vec<ErbNode>,
}

impl ErbTemplate {
    /// Compile template source.
    pub fn compile(source: &str) -> TemplateResult<Self> {
        let mut segments = scan(source)?.into_iter();
        let (nodes, terminator) = block(&mut segments)?;
        match terminator {
            Terminator::Eof => Ok(Self { nodes }),
            Terminator::End(line) => Err(TemplateError::parse(line, "unexpected 'end'")),
            Terminator::Else(line) => Err(TemplateError::parse(line, "'else' without 'if'")),
            Terminator::Elsif(_, line) => Err(TemplateError::parse(line, "'elsif' without 'if'")),
        }
    }

    /// Render against a scope.
    pub fn render(&self, scope: &dyn Scope) -> TemplateResult<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, scope, &mut out)?;
        Ok(out)
    }
}

fn render_nodes(nodes: &[ErbNode], scope: &dyn Scope, out: &mut String) -> TemplateResult<()> {
    for node in nodes {
        match node {
            ErbNode::Text(text) => out.push_str(text),
            ErbNode::Output(expr) => out.push_str(&expr.eval(scope)?.render()),
            ErbNode::Code(expr) => {
                expr.eval(scope)?;
            }
            ErbNode::Conditional(conditional) => {
                if let Some(body) = conditional.select(scope)? {
                    render_nodes(body, scope, out)?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Output,
    Code,
    Comment,
}

#[derive(Debug)]
enum Segment {
    Text(String),
    Output { code: String, line: usize },
    Code { code: String, line: usize },
}

fn newlines(text: &str) -> usize {
    text.matches('\n').count()
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

/// Split source into text and tag segments, applying whitespace trimming.
fn scan(source: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut text_at_line_start = true;
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find("<%") {
        text.push_str(&rest[..start]);
        line += newlines(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(literal) = after.strip_prefix('%') {
            text.push_str("<%");
            rest = literal;
            continue;
        }

        let tag_line = line;
        let (kind, trim_left, body) = match after.as_bytes().first() {
            Some(b'=') => (TagKind::Output, false, &after[1..]),
            Some(b'#') => (TagKind::Comment, false, &after[1..]),
            Some(b'-') => (TagKind::Code, true, &after[1..]),
            _ => (TagKind::Code, false, after),
        };
        let end = body
            .find("%>")
            .ok_or_else(|| TemplateError::parse(tag_line, "unterminated '<%' tag"))?;
        let raw = &body[..end];
        line += newlines(raw);
        let (code, trim_right) = match raw.strip_suffix('-') {
            Some(code) => (code, true),
            None => (raw, false),
        };
        rest = &body[end + 2..];

        // Start of the tag's line within `text`, if the line began there
        let prefix_start = match text.rfind('\n') {
            Some(pos) => Some(pos + 1),
            None if text_at_line_start => Some(0),
            None => None,
        };
        let blank_before = prefix_start.filter(|&p| is_blank(&text[p..]));
        let (tail, newline_len) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], 1),
            None => (rest, 0),
        };

        let mut consumed_newline = false;
        match blank_before {
            Some(p) if kind != TagKind::Output && is_blank(tail) => {
                text.truncate(p);
                rest = &rest[tail.len() + newline_len..];
                consumed_newline = newline_len > 0;
            }
            _ => {
                if trim_left {
                    let kept = text.trim_end_matches([' ', '\t']).len();
                    text.truncate(kept);
                }
                if trim_right {
                    if let Some(stripped) = rest.strip_prefix('\n') {
                        rest = stripped;
                        consumed_newline = true;
                    }
                }
            }
        }
        if consumed_newline {
            line += 1;
        }

        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        text_at_line_start = consumed_newline;

        match kind {
            TagKind::Comment => {}
            TagKind::Output => segments.push(Segment::Output {
                code: code.to_string(),
                line: tag_line,
            }),
            TagKind::Code => segments.push(Segment::Code {
                code: code.to_string(),
                line: tag_line,
            }),
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// What ended a block.
enum Terminator {
    Elsif(Condition, usize),
    Else(usize),
    End(usize),
    Eof,
}

fn block(segments: &mut impl Iterator<Item = Segment>) -> TemplateResult<(Vec<ErbNode>, Terminator)> {
    let mut nodes = Vec::new();
    while let Some(segment) = segments.next() {
        match segment {
            Segment::Text(text) => nodes.push(ErbNode::Text(text)),
            Segment::Output { code, line } => nodes.push(ErbNode::Output(expr::parse(&code, line)?)),
            Segment::Code { code, line } => match Statement::parse(&code, line)? {
                Statement::If(condition) => {
                    nodes.push(ErbNode::Conditional(conditional(segments, condition, line)?));
                }
                Statement::Elsif(condition) => return Ok((nodes, Terminator::Elsif(condition, line))),
                Statement::Else => return Ok((nodes, Terminator::Else(line))),
                Statement::End => return Ok((nodes, Terminator::End(line))),
                Statement::Expr(expr) => nodes.push(ErbNode::Code(expr)),
            },
        }
    }
    Ok((nodes, Terminator::Eof))
}

fn conditional(
    segments: &mut impl Iterator<Item = Segment>,
    first: Condition,
    line: usize,
) -> TemplateResult<Conditional<ErbNode>> {
    let mut branches = Vec::new();
    let mut condition = first;

    loop {
        let (body, terminator) = block(segments)?;
        branches.push((condition, body));
        match terminator {
            Terminator::Elsif(next, _) => condition = next,
            Terminator::End(_) => {
                return Ok(Conditional {
                    branches,
                    else_branch: None,
                });
            }
            Terminator::Else(_) => {
                let (else_body, terminator) = block(segments)?;
                return match terminator {
                    Terminator::End(_) => Ok(Conditional {
                        branches,
                        else_branch: Some(else_body),
                    }),
                    Terminator::Elsif(_, at) => Err(TemplateError::parse(at, "'elsif' after 'else'")),
                    Terminator::Else(at) => Err(TemplateError::parse(at, "duplicate 'else'")),
                    Terminator::Eof => Err(TemplateError::parse(line, "missing 'end' for 'if'")),
                };
            }
            Terminator::Eof => return Err(TemplateError::parse(line, "missing 'end' for 'if'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::MapScope;
    use pretty_assertions::assert_eq;

    fn render(source: &str, scope: &MapScope) -> String {
        ErbTemplate::compile(source).unwrap().render(scope).unwrap()
    }

    #[test]
    fn test_output_tag() {
        let mut scope = MapScope::new();
        scope.insert("title", "Home");
        assert_eq!(render("<p><%= title %></p>", &scope), "<p>Home</p>");
    }

    #[test]
    fn test_output_is_not_escaped() {
        assert_eq!(render("<%= '<b>' %>", &MapScope::new()), "<b>");
    }

    #[test]
    fn test_statement_lines_are_trimmed() {
        let source = "<ul>\n  <% if @show %>\n  <li>yes</li>\n  <% else %>\n  <li>no</li>\n  <% end %>\n</ul>\n";

        let mut scope = MapScope::new();
        scope.insert("show", true);
        assert_eq!(render(source, &scope), "<ul>\n  <li>yes</li>\n</ul>\n");
        assert_eq!(render(source, &MapScope::new()), "<ul>\n  <li>no</li>\n</ul>\n");
    }

    #[test]
    fn test_inline_conditional_keeps_surrounding_text() {
        let source = "[<% if @a %>A<% elsif @b %>B<% else %>C<% end %>]";
        let mut scope = MapScope::new();
        scope.insert("b", "yes");
        assert_eq!(render(source, &scope), "[B]");
        assert_eq!(render(source, &MapScope::new()), "[C]");
    }

    #[test]
    fn test_comments_and_literal_tags() {
        let scope = MapScope::new();
        assert_eq!(render("a<%# note %>b", &scope), "ab");
        assert_eq!(render("<%% x %>", &scope), "<% x %>");
        assert_eq!(render("a\n<%# whole line %>\nb", &scope), "a\nb");
    }

    #[test]
    fn test_dash_trimming() {
        let mut scope = MapScope::new();
        scope.insert("x", "X");
        assert_eq!(render("<%= x -%>\nb", &scope), "Xb");
        assert_eq!(render("a   <%- if true %>b<% end %>", &scope), "ab");
    }

    #[test]
    fn test_unless() {
        let source = "<% unless @hidden %>shown<% end %>";
        assert_eq!(render(source, &MapScope::new()), "shown");

        let mut scope = MapScope::new();
        scope.insert("hidden", true);
        assert_eq!(render(source, &scope), "");
    }

    #[test]
    fn test_structure_errors() {
        let err = ErbTemplate::compile("<% if x %>open").unwrap_err();
        assert!(err.to_string().contains("missing 'end'"));

        let err = ErbTemplate::compile("text\n<% end %>").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { line: 2, .. }));

        let err = ErbTemplate::compile("<%= title").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_expression_error_reports_tag_line() {
        let err = ErbTemplate::compile("a\nb\n<%= ( %>").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_undefined_name_fails_render() {
        let template = ErbTemplate::compile("<%= nope %>").unwrap();
        let err = template.render(&MapScope::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedName { .. }));
    }
}
