//! `#cgo` directive parsing.
//!
//! The comment block attached to `import "C"` may carry lines of the form
//! `#cgo [cond ...] VERB: args` that configure the foreign build. Relative
//! paths in the arguments are kept as-is and `${SRCDIR}` is never expanded
//! here; the sandboxed build that eventually consumes the flags owns both.

use thiserror::Error;

use crate::context::BuildContext;

#[derive(Debug, Error, PartialEq)]
pub enum CgoError {
    #[error("{filename}: invalid #cgo line: {line}")]
    InvalidLine { filename: String, line: String },

    #[error("{filename}: invalid #cgo verb {verb:?}: {line}")]
    InvalidVerb {
        filename: String,
        verb: String,
        line: String,
    },
}

/// Flags and pkg-config names collected from one comment block, in
/// encounter order.
#[derive(Debug, Default, PartialEq)]
pub struct CgoDirectives {
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub fflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub pkg_config: Vec<String>,
}

impl CgoDirectives {
    pub fn is_empty(&self) -> bool {
        self.cflags.is_empty()
            && self.cppflags.is_empty()
            && self.cxxflags.is_empty()
            && self.fflags.is_empty()
            && self.ldflags.is_empty()
            && self.pkg_config.is_empty()
    }
}

/// Parse every `#cgo` line in `text`. Lines that are not `#cgo` directives
/// (e.g. `#include` headers) are passed over. A line whose conditions do not
/// match the context contributes nothing.
pub fn parse_cgo_comment(
    filename: &str,
    text: &str,
    ctx: &BuildContext,
) -> Result<CgoDirectives, CgoError> {
    let mut out = CgoDirectives::default();

    for raw in text.lines() {
        let line = raw.trim();
        let Some(rest) = line.strip_prefix("#cgo") else {
            continue;
        };
        if !rest.starts_with(' ') && !rest.starts_with('\t') {
            continue;
        }
        let invalid_line = || CgoError::InvalidLine {
            filename: filename.to_string(),
            line: raw.to_string(),
        };

        let Some((head, argstr)) = rest.trim().split_once(':') else {
            return Err(invalid_line());
        };
        let fields: Vec<&str> = head.split_whitespace().collect();
        let Some((verb, conds)) = fields.split_last() else {
            return Err(invalid_line());
        };

        // OR across listed conditions; AND is spelled with commas inside one.
        if !conds.is_empty() && !conds.iter().any(|c| match_cond(c, ctx)) {
            continue;
        }

        let args = split_quoted(argstr.trim()).map_err(|_| invalid_line())?;
        match *verb {
            "CFLAGS" => out.cflags.extend(args),
            "CPPFLAGS" => out.cppflags.extend(args),
            "CXXFLAGS" => out.cxxflags.extend(args),
            "FFLAGS" => out.fflags.extend(args),
            "LDFLAGS" => out.ldflags.extend(args),
            "pkg-config" => out.pkg_config.extend(args),
            other => {
                return Err(CgoError::InvalidVerb {
                    filename: filename.to_string(),
                    verb: other.to_string(),
                    line: raw.to_string(),
                })
            }
        }
    }

    Ok(out)
}

fn match_cond(cond: &str, ctx: &BuildContext) -> bool {
    cond.split(',').all(|term| {
        let (negated, name) = match term.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, term),
        };
        if name.starts_with('!') || name.is_empty() {
            return false;
        }
        negated != ctx.match_tag_quiet(name)
    })
}

/// Split a directive argument string honoring shell-style quoting: single and
/// double quotes keep embedded whitespace, backslash escapes the next
/// character. An unclosed quote or trailing escape is an error.
pub fn split_quoted(s: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut arg = String::new();
    let mut saw_quote = false;
    let mut escaped = false;
    let mut quote = '\0';

    for c in s.chars() {
        if escaped {
            escaped = false;
            arg.push(c);
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if quote != '\0' {
            if c == quote {
                quote = '\0';
            } else {
                arg.push(c);
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                saw_quote = true;
                quote = c;
            }
            c if c.is_whitespace() => {
                if saw_quote || !arg.is_empty() {
                    args.push(std::mem::take(&mut arg));
                    saw_quote = false;
                }
            }
            c => arg.push(c),
        }
    }
    if saw_quote || !arg.is_empty() {
        args.push(arg);
    }

    if quote != '\0' {
        return Err("unclosed quote".to_string());
    }
    if escaped {
        return Err("unfinished escaping".to_string());
    }
    Ok(args)
}
