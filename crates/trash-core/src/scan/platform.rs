//! Target platforms used to evaluate build constraints.

use super::constraint::Constraint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating systems recognized in file name suffixes.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Architectures recognized in file name suffixes.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Platforms scanned when none are configured.
pub const DEFAULT_TARGETS: &[(&str, &str)] = &[
    ("linux", "amd64"),
    ("linux", "arm64"),
    ("linux", "arm"),
    ("linux", "386"),
    ("linux", "ppc64le"),
    ("linux", "s390x"),
    ("darwin", "amd64"),
    ("darwin", "arm64"),
    ("windows", "amd64"),
    ("windows", "386"),
    ("windows", "arm64"),
    ("freebsd", "amd64"),
];

/// One environment under which source files are selected.
///
/// `Any` ignores constraints entirely and accepts every file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformVariant {
    Any,
    Target { os: String, arch: String },
}

impl PlatformVariant {
    #[must_use]
    pub fn target(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::Target {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The default platform list.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        DEFAULT_TARGETS
            .iter()
            .map(|(os, arch)| Self::target(*os, *arch))
            .collect()
    }

    /// Whether a single build tag holds on this platform.
    #[must_use]
    pub fn satisfies(&self, tag: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Target { os, arch } => {
                os_matches(os, tag)
                    || tag == arch
                    || (tag == "unix" && UNIX_OS.contains(&os.as_str()))
                    || tag == "cgo"
                    || tag == "gc"
                    || tag.starts_with("go1.")
            }
        }
    }

    /// Check the `_GOOS`, `_GOARCH` and `_GOOS_GOARCH` file name suffixes.
    #[must_use]
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let Self::Target { os, arch } = self else {
            return true;
        };

        let stem = file_name.split('.').next().unwrap_or(file_name);
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let parts: Vec<&str> = stem.split('_').collect();
        let n = parts.len();

        if n >= 3 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return os_matches(os, parts[n - 2]) && arch == parts[n - 1];
        }
        if n >= 2 {
            let last = parts[n - 1];
            if KNOWN_OS.contains(&last) {
                return os_matches(os, last);
            }
            if KNOWN_ARCH.contains(&last) {
                return arch == last;
            }
        }
        true
    }

    /// Whether a file with this name and header constraint is part of the
    /// build on this platform.
    #[must_use]
    pub fn accepts(&self, file_name: &str, constraint: Option<&Constraint>) -> bool {
        if matches!(self, Self::Any) {
            return true;
        }
        self.matches_file_name(file_name)
            && constraint.map_or(true, |c| c.eval(&|tag| self.satisfies(tag)))
    }
}

fn os_matches(os: &str, tag: &str) -> bool {
    tag == os
        || (tag == "linux" && os == "android")
        || (tag == "darwin" && os == "ios")
        || (tag == "solaris" && os == "illumos")
}

impl fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Target { os, arch } => write!(f, "{os}/{arch}"),
        }
    }
}

impl FromStr for PlatformVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        match s.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('/') => {
                Ok(Self::target(os, arch))
            }
            _ => Err(format!(
                "invalid platform '{s}': expected 'any' or '<os>/<arch>'"
            )),
        }
    }
}
