//! Per-directory package aggregation.
//!
//! Folds per-file classification and front-matter scan results into one
//! `Package` record. Each record is privately owned by its directory's
//! analysis and never shared.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace};

use crate::cgo;
use crate::classifier::{self, FileClass};
use crate::context::BuildContext;
use crate::scanner::{self, FileSummary};

/// Analysis results for one package directory, in the wire schema of the
/// toolchain's package loader. Every collection field is omitted from the
/// JSON output when empty; `Name` is always present.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Package {
    #[serde(rename = "Name")]
    pub name: String,
    /// Tags that can influence file selection in this directory.
    #[serde(rename = "AllTags", skip_serializing_if = "Vec::is_empty")]
    pub all_tags: Vec<String>,

    // Source files
    #[serde(rename = "GoFiles", skip_serializing_if = "Vec::is_empty")]
    pub go_files: Vec<String>,
    #[serde(rename = "CgoFiles", skip_serializing_if = "Vec::is_empty")]
    pub cgo_files: Vec<String>,
    #[serde(rename = "IgnoredGoFiles", skip_serializing_if = "Vec::is_empty")]
    pub ignored_go_files: Vec<String>,
    #[serde(rename = "IgnoredOtherFiles", skip_serializing_if = "Vec::is_empty")]
    pub ignored_other_files: Vec<String>,
    #[serde(rename = "CFiles", skip_serializing_if = "Vec::is_empty")]
    pub c_files: Vec<String>,
    #[serde(rename = "CXXFiles", skip_serializing_if = "Vec::is_empty")]
    pub cxx_files: Vec<String>,
    #[serde(rename = "MFiles", skip_serializing_if = "Vec::is_empty")]
    pub m_files: Vec<String>,
    #[serde(rename = "HFiles", skip_serializing_if = "Vec::is_empty")]
    pub h_files: Vec<String>,
    #[serde(rename = "FFiles", skip_serializing_if = "Vec::is_empty")]
    pub f_files: Vec<String>,
    #[serde(rename = "SFiles", skip_serializing_if = "Vec::is_empty")]
    pub s_files: Vec<String>,
    #[serde(rename = "SwigFiles", skip_serializing_if = "Vec::is_empty")]
    pub swig_files: Vec<String>,
    #[serde(rename = "SwigCXXFiles", skip_serializing_if = "Vec::is_empty")]
    pub swig_cxx_files: Vec<String>,
    #[serde(rename = "SysoFiles", skip_serializing_if = "Vec::is_empty")]
    pub syso_files: Vec<String>,

    // Cgo directives
    #[serde(rename = "CgoCFLAGS", skip_serializing_if = "Vec::is_empty")]
    pub cgo_cflags: Vec<String>,
    #[serde(rename = "CgoCPPFLAGS", skip_serializing_if = "Vec::is_empty")]
    pub cgo_cppflags: Vec<String>,
    #[serde(rename = "CgoCXXFLAGS", skip_serializing_if = "Vec::is_empty")]
    pub cgo_cxxflags: Vec<String>,
    #[serde(rename = "CgoFFLAGS", skip_serializing_if = "Vec::is_empty")]
    pub cgo_fflags: Vec<String>,
    #[serde(rename = "CgoLDFLAGS", skip_serializing_if = "Vec::is_empty")]
    pub cgo_ldflags: Vec<String>,
    #[serde(rename = "CgoPkgConfig", skip_serializing_if = "Vec::is_empty")]
    pub cgo_pkg_config: Vec<String>,

    // Test information
    #[serde(rename = "TestGoFiles", skip_serializing_if = "Vec::is_empty")]
    pub test_go_files: Vec<String>,
    #[serde(rename = "XTestGoFiles", skip_serializing_if = "Vec::is_empty")]
    pub xtest_go_files: Vec<String>,

    // Dependency information
    #[serde(rename = "Imports", skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(rename = "TestImports", skip_serializing_if = "Vec::is_empty")]
    pub test_imports: Vec<String>,
    #[serde(rename = "XTestImports", skip_serializing_if = "Vec::is_empty")]
    pub xtest_imports: Vec<String>,

    // //go:embed patterns found in Go source files
    #[serde(rename = "EmbedPatterns", skip_serializing_if = "Vec::is_empty")]
    pub embed_patterns: Vec<String>,
    #[serde(rename = "TestEmbedPatterns", skip_serializing_if = "Vec::is_empty")]
    pub test_embed_patterns: Vec<String>,
    #[serde(rename = "XTestEmbedPatterns", skip_serializing_if = "Vec::is_empty")]
    pub xtest_embed_patterns: Vec<String>,

    // Error information
    #[serde(rename = "InvalidGoFiles", skip_serializing_if = "BTreeMap::is_empty")]
    pub invalid_go_files: BTreeMap<String, String>,
    #[serde(rename = "Error", skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Analyze one directory believed to contain a single Go package. Errors are
/// reported inside the returned record; a partial record is returned even
/// when the directory as a whole fails.
pub fn analyze_package(dir: &Path, ctx: &BuildContext) -> Package {
    let mut agg = Aggregator::new(dir, ctx);

    let entries = match read_sorted_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            agg.pkg.error = format!("failed to read directory {}: {}", dir.display(), e);
            return agg.pkg;
        }
    };

    for (name, file_type) in entries {
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            // Only symlinks resolving to regular files are candidates.
            match fs::metadata(dir.join(&name)) {
                Ok(meta) if meta.is_dir() => continue,
                Err(_) => continue,
                Ok(_) => {}
            }
        }
        agg.consume(&name);
    }

    agg.finalize()
}

/// Directory entries in lexicographic name order, so repeated runs produce
/// byte-identical output. Entries whose names are not UTF-8 cannot be Go
/// sources and are dropped.
fn read_sorted_entries(dir: &Path) -> std::io::Result<Vec<(String, fs::FileType)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        entries.push((name, entry.file_type()?));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

struct Aggregator<'a> {
    dir: &'a Path,
    ctx: &'a BuildContext,
    pkg: Package,
    package_names: BTreeSet<String>,
    all_tags: BTreeSet<String>,
    imports: BTreeSet<String>,
    test_imports: BTreeSet<String>,
    xtest_imports: BTreeSet<String>,
    embeds: BTreeSet<String>,
    test_embeds: BTreeSet<String>,
    xtest_embeds: BTreeSet<String>,
    /// `.S`/`.sx` assembly, buffered until the scan ends: these are compiled
    /// only when cgo files exist in the directory.
    cgo_sfiles: Vec<String>,
}

impl<'a> Aggregator<'a> {
    fn new(dir: &'a Path, ctx: &'a BuildContext) -> Self {
        Self {
            dir,
            ctx,
            pkg: Package::default(),
            package_names: BTreeSet::new(),
            all_tags: BTreeSet::new(),
            imports: BTreeSet::new(),
            test_imports: BTreeSet::new(),
            xtest_imports: BTreeSet::new(),
            embeds: BTreeSet::new(),
            test_embeds: BTreeSet::new(),
            xtest_embeds: BTreeSet::new(),
            cgo_sfiles: Vec::new(),
        }
    }

    fn consume(&mut self, name: &str) {
        let class = classifier::classify(self.dir, name, self.ctx, &mut self.all_tags);
        trace!(name, ?class, "classified entry");
        let ext = classifier::file_extension(name).unwrap_or_default();
        match class {
            FileClass::NotSource | FileClass::IgnoredPrefixed => {}
            FileClass::Invalid(err) => {
                self.pkg.invalid_go_files.insert(name.to_string(), err);
            }
            FileClass::IgnoredByConstraint => {
                if ext == ".go" {
                    self.pkg.ignored_go_files.push(name.to_string());
                } else {
                    self.pkg.ignored_other_files.push(name.to_string());
                }
            }
            FileClass::Included { content } => match ext {
                ".go" => self.consume_go(name, &content.unwrap_or_default()),
                ".S" | ".sx" => self.cgo_sfiles.push(name.to_string()),
                _ => {
                    if let Some(list) = self.file_list_for_ext(ext) {
                        list.push(name.to_string());
                    }
                }
            },
        }
    }

    fn consume_go(&mut self, name: &str, content: &str) {
        let summary = match scanner::scan_source(content) {
            Ok(summary) => Some(summary),
            Err(e) => {
                // Still listed in a bucket below; the record keeps the file's
                // existence alongside its error.
                self.pkg
                    .invalid_go_files
                    .insert(name.to_string(), e.to_string());
                None
            }
        };

        let mut pkg_name = summary
            .as_ref()
            .map(|s| s.package_name.clone())
            .unwrap_or_default();
        if pkg_name == "documentation" {
            // Doc-only pseudo package; never buildable.
            self.pkg.ignored_go_files.push(name.to_string());
            return;
        }

        let is_test = name.ends_with("_test.go");
        let mut is_xtest = false;
        if is_test {
            if let Some(stripped) = pkg_name.strip_suffix("_test") {
                is_xtest = true;
                pkg_name = stripped.to_string();
            }
        }
        if !pkg_name.is_empty() {
            self.package_names.insert(pkg_name);
        }

        let mut is_cgo = false;
        if let Some(summary) = &summary {
            for import in &summary.imports {
                if import.path != "C" {
                    continue;
                }
                if is_test {
                    self.pkg.invalid_go_files.insert(
                        name.to_string(),
                        format!("use of cgo in test {name} not supported"),
                    );
                    return;
                }
                is_cgo = true;
                if self.ctx.cgo_enabled {
                    if let Some(doc) = &import.doc {
                        match cgo::parse_cgo_comment(name, doc, self.ctx) {
                            Ok(directives) => self.save_cgo(directives),
                            Err(e) => {
                                self.pkg
                                    .invalid_go_files
                                    .insert(name.to_string(), format!("cgo error: {e}"));
                            }
                        }
                    }
                }
            }
        }

        if is_cgo {
            self.all_tags.insert("cgo".to_string());
            if self.ctx.cgo_enabled {
                self.pkg.cgo_files.push(name.to_string());
                self.record_summary(&summary, Bucket::Ordinary);
            } else {
                // Imports and embeds from cgo files vanish with cgo disabled.
                self.pkg.ignored_go_files.push(name.to_string());
            }
        } else if is_xtest {
            self.pkg.xtest_go_files.push(name.to_string());
            self.record_summary(&summary, Bucket::ExternalTest);
        } else if is_test {
            self.pkg.test_go_files.push(name.to_string());
            self.record_summary(&summary, Bucket::Test);
        } else {
            self.pkg.go_files.push(name.to_string());
            self.record_summary(&summary, Bucket::Ordinary);
        }
    }

    fn record_summary(&mut self, summary: &Option<FileSummary>, bucket: Bucket) {
        let Some(summary) = summary else {
            return;
        };
        let (imports, embeds) = match bucket {
            Bucket::Ordinary => (&mut self.imports, &mut self.embeds),
            Bucket::Test => (&mut self.test_imports, &mut self.test_embeds),
            Bucket::ExternalTest => (&mut self.xtest_imports, &mut self.xtest_embeds),
        };
        for import in &summary.imports {
            imports.insert(import.path.clone());
        }
        for pattern in &summary.embeds {
            embeds.insert(pattern.clone());
        }
    }

    fn save_cgo(&mut self, directives: cgo::CgoDirectives) {
        self.pkg.cgo_cflags.extend(directives.cflags);
        self.pkg.cgo_cppflags.extend(directives.cppflags);
        self.pkg.cgo_cxxflags.extend(directives.cxxflags);
        self.pkg.cgo_fflags.extend(directives.fflags);
        self.pkg.cgo_ldflags.extend(directives.ldflags);
        self.pkg.cgo_pkg_config.extend(directives.pkg_config);
    }

    fn file_list_for_ext(&mut self, ext: &str) -> Option<&mut Vec<String>> {
        match ext {
            ".c" => Some(&mut self.pkg.c_files),
            ".cc" | ".cpp" | ".cxx" => Some(&mut self.pkg.cxx_files),
            ".m" => Some(&mut self.pkg.m_files),
            ".h" | ".hh" | ".hpp" | ".hxx" => Some(&mut self.pkg.h_files),
            ".f" | ".F" | ".for" | ".f90" => Some(&mut self.pkg.f_files),
            ".s" => Some(&mut self.pkg.s_files),
            ".swig" => Some(&mut self.pkg.swig_files),
            ".swigcxx" => Some(&mut self.pkg.swig_cxx_files),
            ".syso" => Some(&mut self.pkg.syso_files),
            _ => None,
        }
    }

    fn finalize(mut self) -> Package {
        self.pkg.all_tags = self.all_tags.into_iter().collect();
        self.pkg.imports = self.imports.into_iter().collect();
        self.pkg.test_imports = self.test_imports.into_iter().collect();
        self.pkg.xtest_imports = self.xtest_imports.into_iter().collect();
        self.pkg.embed_patterns = self.embeds.into_iter().collect();
        self.pkg.test_embed_patterns = self.test_embeds.into_iter().collect();
        self.pkg.xtest_embed_patterns = self.xtest_embeds.into_iter().collect();

        for flags in [
            &mut self.pkg.cgo_cflags,
            &mut self.pkg.cgo_cppflags,
            &mut self.pkg.cgo_cxxflags,
            &mut self.pkg.cgo_fflags,
            &mut self.pkg.cgo_ldflags,
            &mut self.pkg.cgo_pkg_config,
        ] {
            flags.sort();
            flags.dedup();
        }

        // Uppercase assembly goes through the C compiler, so it is compiled
        // only alongside cgo; otherwise it is just ignored.
        if !self.pkg.cgo_files.is_empty() {
            self.pkg.s_files.append(&mut self.cgo_sfiles);
            self.pkg.s_files.sort();
        } else {
            self.pkg.ignored_other_files.append(&mut self.cgo_sfiles);
            self.pkg.ignored_other_files.sort();
        }

        debug!(
            dir = %self.dir.display(),
            go_files = self.pkg.go_files.len(),
            cgo_files = self.pkg.cgo_files.len(),
            invalid = self.pkg.invalid_go_files.len(),
            "directory scan complete"
        );

        // There can be only one.
        if self.package_names.len() > 1 {
            let names: Vec<String> = self.package_names.into_iter().collect();
            self.pkg.error = format!(
                "multiple package names encountered: {}",
                names.join(", ")
            );
            return self.pkg;
        }
        if let Some(name) = self.package_names.into_iter().next() {
            self.pkg.name = name;
        }

        let buildable = self.pkg.go_files.len()
            + self.pkg.cgo_files.len()
            + self.pkg.test_go_files.len()
            + self.pkg.xtest_go_files.len();
        if buildable == 0 {
            self.pkg.error = format!("no buildable Go source files in {}", self.dir.display());
        }

        self.pkg
    }
}

enum Bucket {
    Ordinary,
    Test,
    ExternalTest,
}
