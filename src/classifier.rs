//! Per-entry file classification.
//!
//! Combines the prefix conventions, the extension tables, and constraint
//! evaluation into one exhaustive outcome per directory entry.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::trace;

use crate::constraint;
use crate::context::BuildContext;

/// Classification outcome for one directory entry.
#[derive(Debug, PartialEq)]
pub enum FileClass {
    /// Selected for the build. `content` carries the file text for `.go`
    /// files so the front-matter scan does not reread the file; non-Go
    /// sources are recorded by name only.
    Included { content: Option<String> },
    /// Rejected by build constraints; reported in an ignored bucket.
    IgnoredByConstraint,
    /// `_`- or `.`-prefixed name; excluded and never reported anywhere.
    IgnoredPrefixed,
    /// Unreadable or carrying a malformed constraint; reported per file.
    Invalid(String),
    /// Not a source candidate at all (unrecognized extension); no record.
    NotSource,
}

/// Extensions recorded as foreign-language sources, plus `.go` itself.
pub fn known_extension(ext: &str) -> bool {
    matches!(
        ext,
        ".go" | ".c"
            | ".cc"
            | ".cpp"
            | ".cxx"
            | ".m"
            | ".h"
            | ".hh"
            | ".hpp"
            | ".hxx"
            | ".f"
            | ".F"
            | ".for"
            | ".f90"
            | ".s"
            | ".S"
            | ".sx"
            | ".swig"
            | ".swigcxx"
            | ".syso"
    )
}

/// The extension including the leading dot, from the last dot in the name.
pub fn file_extension(name: &str) -> Option<&str> {
    name.rfind('.').map(|i| &name[i..])
}

/// Classify one regular file (or file-type symlink) in `dir`. Directories
/// and symlinks resolving to directories must be filtered out by the caller.
pub fn classify(
    dir: &Path,
    name: &str,
    ctx: &BuildContext,
    all_tags: &mut BTreeSet<String>,
) -> FileClass {
    if name.starts_with('_') || name.starts_with('.') {
        return FileClass::IgnoredPrefixed;
    }
    let Some(ext) = file_extension(name) else {
        return FileClass::NotSource;
    };
    if !known_extension(ext) {
        return FileClass::NotSource;
    }
    if !constraint::good_os_arch_file(ctx, name, all_tags) {
        trace!(name, "rejected by filename constraint");
        return FileClass::IgnoredByConstraint;
    }
    if ext == ".syso" {
        // Prebuilt objects are binary; no constraint comments to read.
        return FileClass::Included { content: None };
    }

    let content = match fs::read_to_string(dir.join(name)) {
        Ok(content) => content,
        Err(e) => return FileClass::Invalid(e.to_string()),
    };
    let header = match constraint::scan_header(&content) {
        Ok(header) => header,
        Err(e) => return FileClass::Invalid(e.to_string()),
    };
    match header.eval(ctx, all_tags) {
        Ok(true) => FileClass::Included {
            content: (ext == ".go").then_some(content),
        },
        Ok(false) => {
            trace!(name, "rejected by header constraint");
            FileClass::IgnoredByConstraint
        }
        Err(e) => FileClass::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ctx() -> BuildContext {
        BuildContext {
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
            cgo_enabled: true,
            compiler: "gc".to_string(),
            build_tags: Vec::new(),
            release_tags: vec!["go1.1".to_string()],
        }
    }

    fn classify_file(name: &str, content: &str) -> FileClass {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(name), content).unwrap();
        let mut tags = BTreeSet::new();
        classify(dir.path(), name, &ctx(), &mut tags)
    }

    #[test]
    fn test_prefixed_names_excluded() {
        assert_eq!(classify_file("_gen.go", "package foo\n"), FileClass::IgnoredPrefixed);
        assert_eq!(classify_file(".hidden.go", "package foo\n"), FileClass::IgnoredPrefixed);
    }

    #[test]
    fn test_unknown_extension_dropped() {
        assert_eq!(classify_file("README.md", "hi\n"), FileClass::NotSource);
        assert_eq!(classify_file("Makefile", "all:\n"), FileClass::NotSource);
    }

    #[test]
    fn test_go_file_included_with_content() {
        match classify_file("a.go", "package foo\n") {
            FileClass::Included { content: Some(c) } => assert_eq!(c, "package foo\n"),
            other => panic!("unexpected class: {other:?}"),
        }
    }

    #[test]
    fn test_c_file_included_without_content() {
        assert_eq!(
            classify_file("native.c", "int main() { return 0; }\n"),
            FileClass::Included { content: None }
        );
    }

    #[test]
    fn test_constraint_rejects_go_file() {
        assert_eq!(
            classify_file("a.go", "//go:build windows\n\npackage foo\n"),
            FileClass::IgnoredByConstraint
        );
    }

    #[test]
    fn test_constraint_rejects_c_file() {
        assert_eq!(
            classify_file("native.c", "// +build darwin\n\n#include <x.h>\n"),
            FileClass::IgnoredByConstraint
        );
    }

    #[test]
    fn test_filename_constraint() {
        assert_eq!(
            classify_file("a_windows.go", "package foo\n"),
            FileClass::IgnoredByConstraint
        );
    }

    #[test]
    fn test_syso_included_blind() {
        assert_eq!(
            classify_file("blob.syso", "\u{1}binary"),
            FileClass::Included { content: None }
        );
    }

    #[test]
    fn test_conflicting_constraints_invalid() {
        let class = classify_file("a.go", "//go:build linux\n// +build windows\n\npackage foo\n");
        assert!(matches!(class, FileClass::Invalid(_)));
    }

    #[test]
    fn test_unreadable_file_invalid() {
        let dir = TempDir::new().unwrap();
        let mut tags = BTreeSet::new();
        let class = classify(dir.path(), "missing.go", &ctx(), &mut tags);
        assert!(matches!(class, FileClass::Invalid(_)));
    }
}
