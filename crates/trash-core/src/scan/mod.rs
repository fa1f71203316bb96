//! Per-package import scanning.
//!
//! A package is a directory of `.go` files. Scanning one package for one
//! [`PlatformVariant`] yields the non-standard-library packages it needs,
//! including directories referenced by cgo `#include "dir/file.h"` lines.

pub mod constraint;
pub mod platform;
pub mod source;

use crate::error::Error;
use crate::graph::{is_within_root, PackageSet};
pub use platform::PlatformVariant;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Decides which `.go` file names take part in a scan.
pub type FileFilter = fn(&str) -> bool;

/// Accept every file, tests included.
#[must_use]
pub fn all_files(_name: &str) -> bool {
    true
}

/// Accept everything except `_test.go` files.
#[must_use]
pub fn skip_tests(name: &str) -> bool {
    !name.ends_with("_test.go")
}

/// Inputs for scanning one package directory.
#[derive(Debug, Clone, Copy)]
pub struct PackageScan<'a> {
    /// Import path of the package being scanned.
    pub package: &'a str,
    /// Directory holding its sources.
    pub dir: &'a Path,
    /// Imports inside this path are the project's own and are not reported.
    pub root_package: &'a str,
    pub filter: FileFilter,
}

impl PackageScan<'_> {
    /// Collect the packages imported by files selected for `platform`.
    ///
    /// Unreadable or malformed files are logged and skipped; a missing
    /// directory yields an empty set.
    #[must_use]
    pub fn imports(&self, platform: &PlatformVariant) -> PackageSet {
        let mut result = PackageSet::new();

        let files = match go_files(self.dir, self.filter) {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Package '{}' has no directory at {}", self.package, self.dir.display());
                return result;
            }
            Err(e) => {
                error!("Error listing '{}': {e}", self.dir.display());
                return result;
            }
        };

        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let parsed = trash_util::fs::read_to_string_lossy(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| source::parse(&text));
            let file = match parsed {
                Ok(file) => file,
                Err(message) => {
                    let err = Error::SourceParse {
                        path: path.clone(),
                        message,
                    };
                    error!(code = err.code(), "Error parsing imports: {err}");
                    continue;
                }
            };

            if !platform.accepts(&file_name, file.constraint.as_ref()) {
                debug!("Skipping {} for {platform}", path.display());
                continue;
            }

            for import in &file.imports {
                if let Some(package) = self.normalize(import) {
                    result.insert(package);
                }
            }
            for preamble in &file.cgo_preambles {
                for include_dir in include_dirs(preamble) {
                    if self.dir.join(&include_dir).is_dir() {
                        result.insert(clean_path(&format!("{}/{include_dir}", self.package)));
                    }
                }
            }
        }

        result
    }

    fn normalize(&self, import: &str) -> Option<String> {
        let first = import.split('/').next().unwrap_or_default();
        let import = if first == "." || first == ".." {
            clean_path(&format!("{}/{import}", self.package))
        } else {
            import.to_string()
        };
        if is_standard_library(&import) || is_within_root(&import, self.root_package) {
            return None;
        }
        Some(import)
    }
}

/// Standard library paths have no dot in their first element.
#[must_use]
pub fn is_standard_library(import: &str) -> bool {
    import
        .split('/')
        .next()
        .map_or(true, |first| !first.contains('.'))
}

/// Whether `dir` holds at least one `.go` file with a package clause.
#[must_use]
pub fn is_package_dir(dir: &Path) -> bool {
    let Ok(files) = go_files(dir, all_files) else {
        return false;
    };
    files.iter().any(|path| {
        trash_util::fs::read_to_string_lossy(path)
            .ok()
            .is_some_and(|text| source::parse(&text).is_ok())
    })
}

/// `.go` files directly in `dir`, sorted, without `_`/`.` prefixed names.
fn go_files(dir: &Path, filter: FileFilter) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.ends_with(".go") || name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if !filter(name) || !entry.path().is_file() {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

/// Directory parts of `#include "dir/file.h"` lines.
fn include_dirs(preamble: &str) -> Vec<String> {
    preamble
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("#include")?.trim_start();
            let quoted = rest.strip_prefix('"')?;
            let (path, _) = quoted.split_once('"')?;
            let (dir, _) = path.rsplit_once('/')?;
            (!dir.is_empty()).then(|| dir.to_string())
        })
        .collect()
}

/// Lexically clean a `/`-separated path (`a/./b/../c` becomes `a/c`).
#[must_use]
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scan<'a>(dir: &'a Path, filter: FileFilter) -> PackageScan<'a> {
        PackageScan {
            package: "github.com/x/lib",
            dir,
            root_package: "example.com/app",
            filter,
        }
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("a/./b/../c"), "a/c");
        assert_eq!(clean_path("github.com/x/lib/../util"), "github.com/x/util");
        assert_eq!(clean_path("a//b/"), "a/b");
    }

    #[test]
    fn test_bare_relative_imports_are_resolved() {
        let dir = tempdir().unwrap();
        let s = scan(dir.path(), all_files);
        assert_eq!(s.normalize(".."), Some("github.com/x".to_string()));
        assert_eq!(s.normalize("."), Some("github.com/x/lib".to_string()));
        assert_eq!(s.normalize("../util"), Some("github.com/x/util".to_string()));
        assert_eq!(s.normalize("github.com/pkg/errors"), Some("github.com/pkg/errors".to_string()));
    }

    #[test]
    fn test_standard_library() {
        assert!(is_standard_library("fmt"));
        assert!(is_standard_library("net/http"));
        assert!(is_standard_library("C"));
        assert!(!is_standard_library("github.com/pkg/errors"));
    }

    #[test]
    fn test_include_dirs() {
        let dirs = include_dirs("\n#include \"inc/a.h\"\n #include <stdio.h>\n#include \"flat.h\"\n");
        assert_eq!(dirs, ["inc"]);
    }

    #[test]
    fn test_imports_filtering() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("lib.go"),
            "package lib\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n\t\"example.com/app/internal\"\n\t\"../util\"\n)\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("lib_test.go"),
            "package lib\nimport \"github.com/stretchr/testify/assert\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("_ignored.go"), "package lib\nimport \"github.com/hidden/x\"\n").unwrap();
        fs::write(dir.path().join("broken.go"), "this is not go").unwrap();

        let all = scan(dir.path(), all_files).imports(&PlatformVariant::Any);
        let expected: PackageSet = [
            "github.com/pkg/errors",
            "github.com/stretchr/testify/assert",
            "github.com/x/util",
        ]
        .into_iter()
        .collect();
        assert_eq!(all, expected);

        let no_tests = scan(dir.path(), skip_tests).imports(&PlatformVariant::Any);
        assert!(!no_tests.contains("github.com/stretchr/testify/assert"));
        assert!(no_tests.contains("github.com/pkg/errors"));
    }

    #[test]
    fn test_platform_selection() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_windows.go"), "package lib\nimport \"golang.org/x/sys/windows\"\n").unwrap();
        fs::write(
            dir.path().join("b.go"),
            "//go:build linux\n\npackage lib\nimport \"golang.org/x/sys/unix\"\n",
        )
        .unwrap();

        let linux = scan(dir.path(), all_files).imports(&PlatformVariant::target("linux", "amd64"));
        assert!(linux.contains("golang.org/x/sys/unix"));
        assert!(!linux.contains("golang.org/x/sys/windows"));

        let windows = scan(dir.path(), all_files).imports(&PlatformVariant::target("windows", "amd64"));
        assert!(windows.contains("golang.org/x/sys/windows"));
        assert!(!windows.contains("golang.org/x/sys/unix"));
    }

    #[test]
    fn test_cgo_include_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("csrc")).unwrap();
        fs::write(
            dir.path().join("c.go"),
            "package lib\n\n// #include \"csrc/x.h\"\n// #include \"missing/y.h\"\nimport \"C\"\n",
        )
        .unwrap();

        let found = scan(dir.path(), all_files).imports(&PlatformVariant::Any);
        assert!(found.contains("github.com/x/lib/csrc"));
        assert!(!found.contains("github.com/x/lib/missing"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(scan(&gone, all_files).imports(&PlatformVariant::Any).is_empty());
    }

    #[test]
    fn test_is_package_dir() {
        let dir = tempdir().unwrap();
        assert!(!is_package_dir(dir.path()));
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        assert!(!is_package_dir(dir.path()));
        fs::write(dir.path().join("x.go"), "package x\n").unwrap();
        assert!(is_package_dir(dir.path()));
    }
}
