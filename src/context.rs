use std::collections::BTreeSet;
use std::env;

/// Operating systems the toolchain recognizes in file names and build tags.
pub const KNOWN_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "js",
    "linux",
    "nacl",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "windows",
    "zos",
];

/// Architectures the toolchain recognizes in file names and build tags.
pub const KNOWN_ARCH: &[&str] = &[
    "386",
    "amd64",
    "amd64p32",
    "arm",
    "armbe",
    "arm64",
    "arm64be",
    "loong64",
    "mips",
    "mipsle",
    "mips64",
    "mips64le",
    "mips64p32",
    "mips64p32le",
    "ppc",
    "ppc64",
    "ppc64le",
    "riscv",
    "riscv64",
    "s390",
    "s390x",
    "sparc",
    "sparc64",
    "wasm",
];

/// The highest minor release whose `go1.N` tag is considered satisfied.
const MAX_RELEASE_MINOR: u32 = 22;

/// Read-only build configuration threaded through every selection decision.
///
/// Constructed once per process from host defaults and never mutated during a
/// run. Each analyzed directory sees the same context.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub cgo_enabled: bool,
    pub compiler: String,
    /// Extra tags considered satisfied (none by default; non-default tag sets
    /// are out of scope).
    pub build_tags: Vec<String>,
    /// `go1.1` through the current release, all considered satisfied.
    pub release_tags: Vec<String>,
}

impl BuildContext {
    /// Build context for the host platform.
    ///
    /// `CGO_ENABLED=0` in the environment disables cgo; anything else (or the
    /// variable being unset) leaves it enabled.
    pub fn host_default() -> Self {
        let cgo_enabled = env::var("CGO_ENABLED").map(|v| v != "0").unwrap_or(true);
        Self {
            goos: host_goos().to_string(),
            goarch: host_goarch().to_string(),
            cgo_enabled,
            compiler: "gc".to_string(),
            build_tags: Vec::new(),
            release_tags: (1..=MAX_RELEASE_MINOR).map(|m| format!("go1.{m}")).collect(),
        }
    }

    /// Whether a single build tag is satisfied, recording the consulted name
    /// into `all_tags`.
    pub fn match_tag(&self, name: &str, all_tags: &mut BTreeSet<String>) -> bool {
        all_tags.insert(name.to_string());
        self.match_tag_quiet(name)
    }

    /// Tag matching without recording. Used for `#cgo` line conditions, which
    /// do not contribute to the directory's tag set.
    pub fn match_tag_quiet(&self, name: &str) -> bool {
        if name == "cgo" {
            return self.cgo_enabled;
        }
        if name == self.goos || name == self.goarch || name == self.compiler {
            return true;
        }
        // GOOS values that also satisfy a broader family tag.
        if self.goos == "android" && name == "linux" {
            return true;
        }
        if self.goos == "illumos" && name == "solaris" {
            return true;
        }
        if self.goos == "ios" && name == "darwin" {
            return true;
        }
        self.build_tags.iter().any(|t| t == name) || self.release_tags.iter().any(|t| t == name)
    }
}

pub fn is_known_os(name: &str) -> bool {
    KNOWN_OS.contains(&name)
}

pub fn is_known_arch(name: &str) -> bool {
    KNOWN_ARCH.contains(&name)
}

fn host_goos() -> &'static str {
    match env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_goarch() -> &'static str {
    match env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        "powerpc64" => "ppc64",
        other => other,
    }
}
