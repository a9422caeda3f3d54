/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression language shared by both template families.
//!
//! Supported forms:
//!
//! - Literals: `"text"`, `'text'`, `42`, `true`, `false`, `nil`, `:symbol`
//! - Interpolation inside double quotes: `"#{bundle_name}.html"`
//! - Names and instance names: `filename`, `@content_for_resources`
//! - Helper calls: `h(title)`, `content_tag :p, body, class: "note"`
//! - Field/method access: `current_entry.filename`, `items.length`
//! - Lists and hashes: `[a, b]`, `{ class: "x", :id => "y" }`
//! - Operators: `!`, `&&`, `||`, `==`, `!=`
//!
//! Assignment is deliberately not part of the language.

use std::collections::BTreeMap;

use crate::error::{TemplateError, TemplateResult};
use crate::scope::Scope;
use crate::value::TemplateValue;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant value.
    Literal(TemplateValue),

    /// A double-quoted string with `#{}` parts, concatenated when evaluated.
    Interpolated(Vec<Expr>),

    /// A bare name: a scope value, or a helper called without arguments.
    Name(String),

    /// An `@name` reference. Missing instance names evaluate to `nil`.
    Ivar(String),

    /// A helper call with arguments.
    Call { name: String, args: Vec<Expr> },

    /// Field or method access: `target.name`.
    Field { target: Box<Expr>, name: String },

    /// List literal.
    List(Vec<Expr>),

    /// Hash literal (also used for trailing keyword arguments).
    Hash(Vec<(String, Expr)>),

    /// Logical negation.
    Not(Box<Expr>),

    /// Short-circuit `&&`, yielding the deciding operand.
    And(Box<Expr>, Box<Expr>),

    /// Short-circuit `||`, yielding the deciding operand.
    Or(Box<Expr>, Box<Expr>),

    /// Equality.
    Eq(Box<Expr>, Box<Expr>),

    /// Inequality.
    NotEq(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate this expression against a scope.
    pub fn eval(&self, scope: &dyn Scope) -> TemplateResult<TemplateValue> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&part.eval(scope)?.render());
                }
                Ok(TemplateValue::String(out))
            }

            Expr::Name(name) => match scope.lookup(name) {
                Some(value) => Ok(value),
                None => scope
                    .call(name, &[])
                    .unwrap_or_else(|| Err(undefined(name))),
            },

            Expr::Ivar(name) => Ok(scope.lookup(name).unwrap_or_default()),

            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<TemplateResult<Vec<_>>>()?;
                match scope.call(name, &values) {
                    Some(result) => result,
                    None if values.is_empty() => scope.lookup(name).ok_or_else(|| undefined(name)),
                    None => Err(undefined(name)),
                }
            }

            Expr::Field { target, name } => call_method(target.eval(scope)?, name),

            Expr::List(items) => Ok(TemplateValue::List(
                items
                    .iter()
                    .map(|item| item.eval(scope))
                    .collect::<TemplateResult<Vec<_>>>()?,
            )),

            Expr::Hash(pairs) => {
                let mut map = BTreeMap::new();
                for (key, value) in pairs {
                    map.insert(key.clone(), value.eval(scope)?);
                }
                Ok(TemplateValue::Map(map))
            }

            Expr::Not(inner) => Ok(TemplateValue::Bool(!inner.eval(scope)?.is_truthy())),

            Expr::And(left, right) => {
                let left = left.eval(scope)?;
                if left.is_truthy() {
                    right.eval(scope)
                } else {
                    Ok(left)
                }
            }

            Expr::Or(left, right) => {
                let left = left.eval(scope)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    right.eval(scope)
                }
            }

            Expr::Eq(left, right) => Ok(TemplateValue::Bool(
                left.eval(scope)? == right.eval(scope)?,
            )),

            Expr::NotEq(left, right) => Ok(TemplateValue::Bool(
                left.eval(scope)? != right.eval(scope)?,
            )),
        }
    }
}

fn undefined(name: &str) -> TemplateError {
    TemplateError::UndefinedName {
        name: name.to_string(),
    }
}

fn length(len: usize) -> TemplateValue {
    TemplateValue::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

/// Apply `.name` to a value: map fields first, then the built-in methods.
fn call_method(value: TemplateValue, name: &str) -> TemplateResult<TemplateValue> {
    if let TemplateValue::Map(map) = &value {
        if let Some(field) = map.get(name) {
            return Ok(field.clone());
        }
    }

    let result = match (&value, name) {
        (_, "to_s") => TemplateValue::String(value.render()),
        (_, "nil?") => TemplateValue::Bool(matches!(value, TemplateValue::Null)),
        (TemplateValue::String(s), "length" | "size") => length(s.chars().count()),
        (TemplateValue::List(items), "length" | "size") => length(items.len()),
        (TemplateValue::Map(map), "length" | "size") => length(map.len()),
        (TemplateValue::String(s), "empty?") => TemplateValue::Bool(s.is_empty()),
        (TemplateValue::List(items), "empty?") => TemplateValue::Bool(items.is_empty()),
        (TemplateValue::Map(map), "empty?") => TemplateValue::Bool(map.is_empty()),
        (TemplateValue::String(s), "upcase") => TemplateValue::String(s.to_uppercase()),
        (TemplateValue::String(s), "downcase") => TemplateValue::String(s.to_lowercase()),
        (TemplateValue::String(s), "strip") => TemplateValue::String(s.trim().to_string()),
        (TemplateValue::List(items), "first") => items.first().cloned().unwrap_or_default(),
        (TemplateValue::List(items), "last") => items.last().cloned().unwrap_or_default(),
        (TemplateValue::List(items), "join") => {
            TemplateValue::String(items.iter().map(TemplateValue::render).collect())
        }
        // Missing keys on a hash read as nil
        (TemplateValue::Map(_), _) => TemplateValue::Null,
        _ => {
            return Err(TemplateError::evaluation(format!(
                "undefined method '{}' for {}",
                name,
                value.type_name()
            )));
        }
    };
    Ok(result)
}

/// A condition of an `if`/`unless`/`elsif` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expr: Expr,
    /// True for `unless`.
    pub negated: bool,
}

impl Condition {
    /// Evaluate the condition.
    pub fn holds(&self, scope: &dyn Scope) -> TemplateResult<bool> {
        Ok(self.expr.eval(scope)?.is_truthy() != self.negated)
    }
}

/// Parse an expression. `line` is used for error reporting.
pub fn parse(source: &str, line: usize) -> TemplateResult<Expr> {
    parse_source(source).map_err(|message| TemplateError::parse(line, message))
}

/// Parse text containing `#{}` interpolations (no surrounding quotes).
pub fn parse_interpolated(text: &str, line: usize) -> TemplateResult<Expr> {
    let chars: Vec<char> = text.chars().collect();
    interpolated(&chars).map_err(|message| TemplateError::parse(line, message))
}

fn parse_source(source: &str) -> Result<Expr, String> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some(rest) = parser.peek() {
        return Err(format!("unexpected {} after expression", describe(rest)));
    }
    Ok(expr)
}

fn interpolated(chars: &[char]) -> Result<Expr, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&'#') => {
                literal.push('#');
                i += 2;
            }
            '#' if chars.get(i + 1) == Some(&'{') => {
                let end = skip_interpolation(chars, i + 2)?;
                let inner: String = chars[i + 2..end - 1].iter().collect();
                if !literal.is_empty() {
                    parts.push(Expr::Literal(TemplateValue::String(std::mem::take(
                        &mut literal,
                    ))));
                }
                parts.push(parse_source(&inner)?);
                i = end;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if parts.is_empty() {
        return Ok(Expr::Literal(TemplateValue::String(literal)));
    }
    if !literal.is_empty() {
        parts.push(Expr::Literal(TemplateValue::String(literal)));
    }
    Ok(Expr::Interpolated(parts))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String, bool),
    Int(i64),
    Ident(String),
    Ivar(String),
    Symbol(String),
    Label(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Arrow,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
}

#[derive(Debug)]
struct Lexed {
    token: Token,
    /// Whitespace preceded this token.
    spaced: bool,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Str(s, _) => format!("string \"{}\"", s),
        Token::Int(i) => format!("integer {}", i),
        Token::Ident(s) => format!("name '{}'", s),
        Token::Ivar(s) => format!("'@{}'", s),
        Token::Symbol(s) => format!("symbol ':{}'", s),
        Token::Label(s) => format!("label '{}:'", s),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::LBrace => "'{'".to_string(),
        Token::RBrace => "'}'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Arrow => "'=>'".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::NotEq => "'!='".to_string(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn read_ident(chars: &[char], i: &mut usize) -> String {
    let start = *i;
    while *i < chars.len() && is_ident_char(chars[*i]) {
        *i += 1;
    }
    // Predicate and bang suffixes, but not the start of `!=`
    if let Some(&c) = chars.get(*i) {
        if (c == '?' || c == '!') && chars.get(*i + 1) != Some(&'=') && *i > start {
            *i += 1;
        }
    }
    chars[start..*i].iter().collect()
}

/// Read a quoted string starting at `start` (the quote). Returns the raw
/// content with escapes applied and the index after the closing quote.
/// `#{...}` sections of double-quoted strings are copied verbatim.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    loop {
        match chars.get(i) {
            None => return Err("unterminated string literal".to_string()),
            Some('\\') => {
                match chars.get(i + 1) {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    // Keep the escape so interpolation parsing sees it
                    Some('#') => text.push_str("\\#"),
                    Some(&c) => text.push(c),
                    None => return Err("unterminated string literal".to_string()),
                }
                i += 2;
            }
            Some('#') if quote == '"' && chars.get(i + 1) == Some(&'{') => {
                let end = skip_interpolation(chars, i + 2)?;
                text.extend(&chars[i..end]);
                i = end;
            }
            Some(&c) if c == quote => return Ok((text, i + 1)),
            Some(&c) => {
                text.push(c);
                i += 1;
            }
        }
    }
}

/// Given the index just after `#{`, return the index after the matching `}`.
fn skip_interpolation(chars: &[char], mut i: usize) -> Result<usize, String> {
    let mut depth = 1;
    while i < chars.len() {
        match chars[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            '"' | '\'' => {
                let (_, next) = read_string(chars, i)?;
                i = next;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Err("unterminated #{} interpolation".to_string())
}

fn tokenize(source: &str) -> Result<Vec<Lexed>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut spaced = false;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            spaced = true;
            i += 1;
            continue;
        }

        let token = match c {
            '"' | '\'' => {
                let (text, next) = read_string(&chars, i)?;
                i = next;
                Token::Str(text, c == '"')
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                Token::Int(
                    digits
                        .parse()
                        .map_err(|_| format!("integer literal out of range: {}", digits))?,
                )
            }
            '@' => {
                i += 1;
                let name = read_ident(&chars, &mut i);
                if name.is_empty() {
                    return Err("expected a name after '@'".to_string());
                }
                Token::Ivar(name)
            }
            ':' => {
                i += 1;
                match chars.get(i) {
                    Some('"' | '\'') => {
                        let (text, next) = read_string(&chars, i)?;
                        i = next;
                        Token::Symbol(text)
                    }
                    Some(&c) if is_ident_start(c) => Token::Symbol(read_ident(&chars, &mut i)),
                    _ => return Err("expected a symbol name after ':'".to_string()),
                }
            }
            c if is_ident_start(c) => {
                let name = read_ident(&chars, &mut i);
                if chars.get(i) == Some(&':') && chars.get(i + 1) != Some(&':') {
                    i += 1;
                    Token::Label(name)
                } else {
                    Token::Ident(name)
                }
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | '.' => {
                i += 1;
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    _ => Token::Dot,
                }
            }
            '=' => match chars.get(i + 1) {
                Some('>') => {
                    i += 2;
                    Token::Arrow
                }
                Some('=') => {
                    i += 2;
                    Token::EqEq
                }
                _ => return Err("assignment is not supported in templates".to_string()),
            },
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::NotEq
                } else {
                    i += 1;
                    Token::Bang
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                i += 2;
                Token::AndAnd
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                i += 2;
                Token::OrOr
            }
            other => return Err(format!("unexpected character '{}'", other)),
        };

        tokens.push(Lexed { token, spaced });
        spaced = false;
    }

    Ok(tokens)
}

/// Tokens that can begin an argument of a call written without parentheses.
fn starts_command_argument(token: &Token) -> bool {
    matches!(
        token,
        Token::Str(..)
            | Token::Int(_)
            | Token::Symbol(_)
            | Token::Ivar(_)
            | Token::Ident(_)
            | Token::Label(_)
            | Token::LBracket
    )
}

struct Parser {
    tokens: Vec<Lexed>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        if self.eat(token) {
            return Ok(());
        }
        match self.peek() {
            Some(found) => Err(format!(
                "expected {} but found {}",
                describe(token),
                describe(found)
            )),
            None => Err(format!("expected {} at end of expression", describe(token))),
        }
    }

    fn expression(&mut self) -> Result<Expr, String> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        loop {
            if self.eat(&Token::EqEq) {
                let right = self.unary()?;
                left = Expr::Eq(Box::new(left), Box::new(right));
            } else if self.eat(&Token::NotEq) {
                let right = self.unary()?;
                left = Expr::NotEq(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            match self.next_token() {
                Some(Token::Ident(name)) => {
                    expr = Expr::Field {
                        target: Box::new(expr),
                        name,
                    };
                }
                _ => return Err("expected a method name after '.'".to_string()),
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next_token() {
            Some(Token::Str(text, true)) => {
                let chars: Vec<char> = text.chars().collect();
                interpolated(&chars)
            }
            Some(Token::Str(text, false)) => Ok(Expr::Literal(TemplateValue::String(text))),
            Some(Token::Int(i)) => Ok(Expr::Literal(TemplateValue::Int(i))),
            Some(Token::Symbol(s)) => Ok(Expr::Literal(TemplateValue::String(s))),
            Some(Token::Ivar(name)) => Ok(Expr::Ivar(name)),
            Some(Token::Ident(name)) => self.identifier(name),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                loop {
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                    items.push(self.expression()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Token::LBrace) => Ok(Expr::Hash(self.hash_entries()?)),
            Some(other) => Err(format!("unexpected {}", describe(&other))),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr, String> {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(TemplateValue::Bool(true))),
            "false" => return Ok(Expr::Literal(TemplateValue::Bool(false))),
            "nil" => return Ok(Expr::Literal(TemplateValue::Null)),
            _ => {}
        }

        if let Some(next) = self.tokens.get(self.pos) {
            if next.token == Token::LParen && !next.spaced {
                self.pos += 1;
                let args = self.arguments(Some(&Token::RParen))?;
                return Ok(Expr::Call { name, args });
            }
            if next.spaced && starts_command_argument(&next.token) {
                let args = self.arguments(None)?;
                return Ok(Expr::Call { name, args });
            }
        }

        Ok(Expr::Name(name))
    }

    /// Parse call arguments. With `close`, arguments are parenthesised;
    /// without, they run until the first argument not followed by a comma.
    /// Trailing `key: value` pairs are gathered into one hash argument.
    fn arguments(&mut self, close: Option<&Token>) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        let mut pairs = Vec::new();

        loop {
            if let Some(close) = close {
                if self.eat(close) {
                    break;
                }
            }

            if let Some(key) = self.hash_key() {
                pairs.push((key, self.expression()?));
            } else {
                if !pairs.is_empty() {
                    return Err("positional argument after keyword arguments".to_string());
                }
                args.push(self.expression()?);
            }

            if self.eat(&Token::Comma) {
                continue;
            }
            if let Some(close) = close {
                self.expect(close)?;
            }
            break;
        }

        if !pairs.is_empty() {
            args.push(Expr::Hash(pairs));
        }
        Ok(args)
    }

    /// Consume a hash key (`key:`, `:key =>` or `"key" =>`) if one is next.
    fn hash_key(&mut self) -> Option<String> {
        let arrow_follows = matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.token),
            Some(Token::Arrow)
        );
        match self.peek() {
            Some(Token::Label(key)) => {
                let key = key.clone();
                self.pos += 1;
                Some(key)
            }
            Some(Token::Symbol(key) | Token::Str(key, _)) if arrow_follows => {
                let key = key.clone();
                self.pos += 2;
                Some(key)
            }
            _ => None,
        }
    }

    fn hash_entries(&mut self) -> Result<Vec<(String, Expr)>, String> {
        let mut pairs = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            let key = self
                .hash_key()
                .ok_or_else(|| "expected a hash key".to_string())?;
            pairs.push((key, self.expression()?));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(pairs)
    }
}
