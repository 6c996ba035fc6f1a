//! Front-matter scanner for Go source files.
//!
//! Parses a file just far enough to extract the package clause, the import
//! declarations (keeping the attached comment group only for `import "C"`),
//! and `//go:embed` directive patterns. No expression or function-body
//! analysis happens here.

use thiserror::Error;
use tracing::trace;
use tree_sitter::Node;

use crate::utils::unquote_string;

#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    #[error("failed to load Go grammar: {0}")]
    Grammar(String),

    #[error("failed to parse Go source")]
    Parse,

    #[error("missing package clause")]
    MissingPackageClause,

    #[error("invalid quoted string in //go:embed: {0}")]
    EmbedQuoting(String),

    #[error("usage: //go:embed pattern...")]
    EmbedUsage,
}

/// One import declaration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    /// The comment group immediately above the spec, markers stripped.
    /// Populated only when `path` is `"C"`; that block carries the `#cgo`
    /// directives.
    pub doc: Option<String>,
}

/// Everything file selection needs to know about one source file.
#[derive(Debug, Default, PartialEq)]
pub struct FileSummary {
    pub package_name: String,
    pub imports: Vec<Import>,
    pub embeds: Vec<String>,
}

pub fn scan_source(source: &str) -> Result<FileSummary, ScanError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| ScanError::Grammar(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or(ScanError::Parse)?;
    let root = tree.root_node();

    let mut summary = FileSummary::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                if summary.package_name.is_empty() {
                    if let Some(name) = package_identifier(&child, source) {
                        summary.package_name = name;
                    }
                }
            }
            "import_declaration" => collect_imports(&child, source, &mut summary.imports),
            _ => {}
        }
    }

    if summary.package_name.is_empty() {
        return Err(ScanError::MissingPackageClause);
    }

    collect_embeds(root, source, &mut summary.embeds)?;

    trace!(
        package = %summary.package_name,
        imports = summary.imports.len(),
        embeds = summary.embeds.len(),
        "scanned front matter"
    );
    Ok(summary)
}

fn package_identifier(clause: &Node, source: &str) -> Option<String> {
    let mut cursor = clause.walk();
    let name = clause
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_identifier")
        .map(|n| node_text(&n, source).to_string());
    name
}

fn collect_imports(decl: &Node, source: &str, out: &mut Vec<Import>) {
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        match child.kind() {
            // Bare form: the doc comment hangs off the declaration itself.
            "import_spec" => push_import(&child, decl, source, out),
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        push_import(&spec, &spec, source, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_import(spec: &Node, doc_anchor: &Node, source: &str, out: &mut Vec<Import>) {
    let Some(path_node) = spec.child_by_field_name("path") else {
        return;
    };
    let path = unquote_string(node_text(&path_node, source));
    let doc = if path == "C" {
        doc_comment(doc_anchor, source)
    } else {
        None
    };
    out.push(Import { path, doc });
}

/// The contiguous run of comment siblings directly above `node`, rendered as
/// plain text. A gap of even one blank line detaches the group.
fn doc_comment(node: &Node, source: &str) -> Option<String> {
    let mut comments = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut prev = node.prev_sibling();
    while let Some(n) = prev {
        if n.kind() != "comment" || n.end_position().row + 1 != expected_row {
            break;
        }
        expected_row = n.start_position().row;
        comments.push(n);
        prev = n.prev_sibling();
    }
    if comments.is_empty() {
        return None;
    }
    comments.reverse();

    let mut lines = Vec::new();
    for c in &comments {
        let text = node_text(c, source);
        if let Some(rest) = text.strip_prefix("//") {
            lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if let Some(rest) = text.strip_prefix("/*") {
            let inner = rest.strip_suffix("*/").unwrap_or(rest);
            lines.extend(inner.lines().map(|l| l.to_string()));
        }
    }
    Some(lines.join("\n"))
}

/// Gather `//go:embed` patterns from every comment in the file. Validating
/// that a directive actually precedes an embeddable declaration is the
/// compiler's job, not selection's.
fn collect_embeds(node: Node, source: &str, out: &mut Vec<String>) -> Result<(), ScanError> {
    if node.kind() == "comment" {
        let text = node_text(&node, source);
        if let Some(args) = text.strip_prefix("//go:embed") {
            if args.starts_with(' ') || args.starts_with('\t') {
                out.extend(parse_go_embed(args.trim())?);
            } else if args.is_empty() {
                return Err(ScanError::EmbedUsage);
            }
        }
        return Ok(());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_embeds(child, source, out)?;
    }
    Ok(())
}

/// Split an embed payload into patterns: whitespace-separated, with
/// `"quoted"` (escape-processed) and `` `backquoted` `` (verbatim) forms for
/// patterns containing whitespace.
fn parse_go_embed(args: &str) -> Result<Vec<String>, ScanError> {
    if args.is_empty() {
        return Err(ScanError::EmbedUsage);
    }
    let mut patterns = Vec::new();
    let mut rest = args;
    while !rest.is_empty() {
        let consumed;
        match rest.as_bytes()[0] {
            b'`' => {
                let Some(end) = rest[1..].find('`') else {
                    return Err(ScanError::EmbedQuoting(rest.to_string()));
                };
                patterns.push(rest[1..end + 1].to_string());
                consumed = end + 2;
            }
            b'"' => {
                let (pattern, end) = unquote_interpreted(rest)?;
                patterns.push(pattern);
                consumed = end;
            }
            _ => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                patterns.push(rest[..end].to_string());
                consumed = end;
            }
        }
        rest = &rest[consumed..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err(ScanError::EmbedQuoting(rest.to_string()));
        }
        rest = rest.trim_start();
    }
    Ok(patterns)
}

/// Decode a leading `"..."` literal, returning the value and the number of
/// bytes consumed including both quotes.
fn unquote_interpreted(s: &str) -> Result<(String, usize), ScanError> {
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, i + 1)),
            '\\' => match chars.next() {
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                _ => return Err(ScanError::EmbedQuoting(s.to_string())),
            },
            c => value.push(c),
        }
    }
    Err(ScanError::EmbedQuoting(s.to_string()))
}

fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_package_clause() {
        let summary = scan_source("package foo\n").unwrap();
        assert_eq!(summary.package_name, "foo");
        assert!(summary.imports.is_empty());
        assert!(summary.embeds.is_empty());
    }

    #[test]
    fn test_missing_package_clause() {
        assert_eq!(scan_source("const x = 1\n"), Err(ScanError::MissingPackageClause));
    }

    #[test]
    fn test_single_import() {
        let summary = scan_source("package foo\n\nimport \"fmt\"\n").unwrap();
        assert_eq!(
            summary.imports,
            vec![Import {
                path: "fmt".to_string(),
                doc: None,
            }]
        );
    }

    #[test]
    fn test_grouped_imports_with_aliases() {
        let src = r#"package foo

import (
    "fmt"
    xos "os"
    _ "net/http/pprof"
    . "strings"
)
"#;
        let summary = scan_source(src).unwrap();
        let paths: Vec<&str> = summary.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["fmt", "os", "net/http/pprof", "strings"]);
    }

    #[test]
    fn test_import_c_keeps_block_doc() {
        let src = "package foo\n\n/*\n#cgo LDFLAGS: -lm\n#include <math.h>\n*/\nimport \"C\"\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.imports.len(), 1);
        assert_eq!(summary.imports[0].path, "C");
        assert_eq!(
            summary.imports[0].doc.as_deref(),
            Some("\n#cgo LDFLAGS: -lm\n#include <math.h>")
        );
    }

    #[test]
    fn test_import_c_keeps_line_doc() {
        let src = "package foo\n\n// #cgo CFLAGS: -O2\n// #include <fast.h>\nimport \"C\"\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(
            summary.imports[0].doc.as_deref(),
            Some("#cgo CFLAGS: -O2\n#include <fast.h>")
        );
    }

    #[test]
    fn test_blank_line_detaches_doc() {
        let src = "package foo\n\n// #cgo LDFLAGS: -lm\n\nimport \"C\"\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.imports[0].doc, None);
    }

    #[test]
    fn test_doc_kept_only_for_c() {
        let src = "package foo\n\n// Blank import for side effects.\nimport \"net/http\"\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.imports[0].doc, None);
    }

    #[test]
    fn test_import_c_in_group() {
        let src = "package foo\n\nimport (\n\t// #cgo LDFLAGS: -lz\n\t\"C\"\n)\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.imports[0].path, "C");
        assert_eq!(summary.imports[0].doc.as_deref(), Some("#cgo LDFLAGS: -lz"));
    }

    #[test]
    fn test_embed_patterns() {
        let src = r#"package foo

import "embed"

//go:embed static/* templates
var content embed.FS
"#;
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.embeds, vec!["static/*", "templates"]);
    }

    #[test]
    fn test_embed_quoted_patterns() {
        let src = "package foo\n\nimport \"embed\"\n\n//go:embed \"a file.txt\" `b dir/*` plain\nvar f embed.FS\n";
        let summary = scan_source(src).unwrap();
        assert_eq!(summary.embeds, vec!["a file.txt", "b dir/*", "plain"]);
    }

    #[test]
    fn test_embed_malformed_quoting() {
        let src = "package foo\n\n//go:embed \"unterminated\nvar f embed.FS\n";
        assert!(matches!(
            scan_source(src),
            Err(ScanError::EmbedQuoting(_))
        ));
    }

    #[test]
    fn test_embed_without_patterns() {
        let src = "package foo\n\n//go:embed\nvar f embed.FS\n";
        assert_eq!(scan_source(src), Err(ScanError::EmbedUsage));
    }

    #[test]
    fn test_parse_go_embed_escapes() {
        assert_eq!(
            parse_go_embed(r#""tab\there""#).unwrap(),
            vec!["tab\there"]
        );
    }

    #[test]
    fn test_body_is_not_analyzed() {
        let src = r#"package foo

import "fmt"

func main() {
    fmt.Println("import \"not-an-import\"")
}
"#;
        let summary = scan_source(src).unwrap();
        let paths: Vec<&str> = summary.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["fmt"]);
    }
}
