//! Build constraint evaluation.
//!
//! Two comment forms gate file selection: the structured `//go:build`
//! expression and the legacy `// +build` line list. Both are read from the
//! leading comment block of a file, so this module works on raw text and is
//! shared by Go and non-Go sources. File names carry implicit constraints as
//! well (`_GOOS`, `_GOARCH`, `_GOOS_GOARCH` suffixes).

use std::collections::BTreeSet;

use thiserror::Error;

use crate::context::{is_known_arch, is_known_os, BuildContext};

#[derive(Debug, Error, PartialEq)]
pub enum ConstraintError {
    #[error("multiple //go:build comments")]
    MultipleGoBuild,

    #[error("malformed //go:build expression: {0}")]
    Malformed(String),

    #[error("//go:build and // +build lines disagree")]
    Mismatch,
}

/// Constraint comments found in a file's leading comment block.
#[derive(Debug, Default, PartialEq)]
pub struct HeaderConstraints {
    pub go_build: Option<String>,
    pub plus_build: Vec<String>,
}

impl HeaderConstraints {
    pub fn is_empty(&self) -> bool {
        self.go_build.is_none() && self.plus_build.is_empty()
    }

    /// Whether the file is selected under `ctx`. When both comment forms are
    /// present they are evaluated independently and must agree; a
    /// disagreement makes the file invalid rather than silently preferring
    /// one form.
    pub fn eval(
        &self,
        ctx: &BuildContext,
        all_tags: &mut BTreeSet<String>,
    ) -> Result<bool, ConstraintError> {
        match &self.go_build {
            Some(text) => {
                let expr = Expr::parse(text)?;
                let modern = expr.eval(ctx, all_tags);
                if !self.plus_build.is_empty() {
                    let legacy = eval_plus_build(&self.plus_build, ctx, all_tags);
                    if legacy != modern {
                        return Err(ConstraintError::Mismatch);
                    }
                }
                Ok(modern)
            }
            None if !self.plus_build.is_empty() => {
                Ok(eval_plus_build(&self.plus_build, ctx, all_tags))
            }
            None => Ok(true),
        }
    }
}

/// Extract constraint comments from the leading run of blank lines and
/// comments. Scanning stops at the first real content line (normally the
/// package clause). At most one `//go:build` line is allowed.
pub fn scan_header(content: &str) -> Result<HeaderConstraints, ConstraintError> {
    let mut hdr = HeaderConstraints::default();
    let mut in_block = false;

    for raw in content.lines() {
        let line = raw.trim();
        if in_block {
            if let Some(pos) = line.find("*/") {
                in_block = false;
                if !line[pos + 2..].trim().is_empty() {
                    break;
                }
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("//") {
            // The directive marker allows no space between `//` and `go:build`.
            if let Some(expr) = rest.strip_prefix("go:build") {
                if expr.is_empty() || expr.starts_with(' ') || expr.starts_with('\t') {
                    if hdr.go_build.is_some() {
                        return Err(ConstraintError::MultipleGoBuild);
                    }
                    hdr.go_build = Some(expr.trim().to_string());
                    continue;
                }
            }
            if let Some(expr) = rest.trim_start().strip_prefix("+build") {
                if expr.is_empty() || expr.starts_with(' ') || expr.starts_with('\t') {
                    hdr.plus_build.push(expr.trim().to_string());
                }
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("/*") {
            match rest.find("*/") {
                Some(pos) if rest[pos + 2..].trim().is_empty() => {}
                Some(_) => break,
                None => in_block = true,
            }
            continue;
        }
        break;
    }

    Ok(hdr)
}

/// Legacy form: AND across lines, OR across whitespace-separated fields,
/// AND across comma-separated terms within a field.
fn eval_plus_build(lines: &[String], ctx: &BuildContext, all_tags: &mut BTreeSet<String>) -> bool {
    lines.iter().all(|line| {
        line.split_whitespace()
            .any(|field| field.split(',').all(|term| match_term(term, ctx, all_tags)))
    })
}

fn match_term(term: &str, ctx: &BuildContext, all_tags: &mut BTreeSet<String>) -> bool {
    let (negated, name) = match term.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, term),
    };
    // Double negation never matches.
    if name.starts_with('!') || name.is_empty() {
        return false;
    }
    negated != ctx.match_tag(name, all_tags)
}

/// A parsed `//go:build` expression: `||` binds loosest, then `&&`, then `!`.
#[derive(Debug, PartialEq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn parse(text: &str) -> Result<Self, ConstraintError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr(text)?;
        if parser.pos != parser.tokens.len() {
            return Err(ConstraintError::Malformed(text.to_string()));
        }
        Ok(expr)
    }

    pub fn eval(&self, ctx: &BuildContext, all_tags: &mut BTreeSet<String>) -> bool {
        match self {
            Expr::Tag(name) => ctx.match_tag(name, all_tags),
            Expr::Not(inner) => !inner.eval(ctx, all_tags),
            Expr::And(a, b) => {
                // Evaluate both sides so every mentioned tag is recorded.
                let l = a.eval(ctx, all_tags);
                let r = b.eval(ctx, all_tags);
                l && r
            }
            Expr::Or(a, b) => {
                let l = a.eval(ctx, all_tags);
                let r = b.eval(ctx, all_tags);
                l || r
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    OrOr,
    AndAnd,
    Not,
    LParen,
    RParen,
    Tag(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>, ConstraintError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(ConstraintError::Malformed(text.to_string()));
                }
                tokens.push(if c == '&' { Token::AndAnd } else { Token::OrOr });
            }
            c if is_tag_char(c) => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_tag_char(c) {
                        break;
                    }
                    tag.push(c);
                    chars.next();
                }
                tokens.push(Token::Tag(tag));
            }
            _ => return Err(ConstraintError::Malformed(text.to_string())),
        }
    }
    Ok(tokens)
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn or_expr(&mut self, text: &str) -> Result<Expr, ConstraintError> {
        let mut left = self.and_expr(text)?;
        while self.eat(&Token::OrOr) {
            let right = self.and_expr(text)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self, text: &str) -> Result<Expr, ConstraintError> {
        let mut left = self.unary(text)?;
        while self.eat(&Token::AndAnd) {
            let right = self.unary(text)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self, text: &str) -> Result<Expr, ConstraintError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary(text)?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr(text)?;
            if !self.eat(&Token::RParen) {
                return Err(ConstraintError::Malformed(text.to_string()));
            }
            return Ok(inner);
        }
        match self.tokens.get(self.pos) {
            Some(Token::Tag(name)) => {
                let tag = name.clone();
                self.pos += 1;
                Ok(Expr::Tag(tag))
            }
            _ => Err(ConstraintError::Malformed(text.to_string())),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

/// Implicit constraints carried by the file name itself. A trailing `_GOOS`,
/// `_GOARCH`, or `_GOOS_GOARCH` component (after stripping the extension and
/// a `_test` suffix) must match the context for the file to be considered.
pub fn good_os_arch_file(ctx: &BuildContext, name: &str, all_tags: &mut BTreeSet<String>) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    let stem = stem.strip_suffix("_test").unwrap_or(stem);
    let Some(i) = stem.find('_') else {
        return true;
    };
    // Everything before the first underscore is ignored, so the split below
    // always starts with an empty component.
    let mut parts: Vec<&str> = stem[i..].split('_').collect();
    if parts.last() == Some(&"") {
        parts.pop();
    }
    let n = parts.len();
    if n >= 2 && is_known_os(parts[n - 2]) && is_known_arch(parts[n - 1]) {
        return ctx.match_tag(parts[n - 1], all_tags) && ctx.match_tag(parts[n - 2], all_tags);
    }
    if n >= 1 && (is_known_os(parts[n - 1]) || is_known_arch(parts[n - 1])) {
        return ctx.match_tag(parts[n - 1], all_tags);
    }
    true
}
