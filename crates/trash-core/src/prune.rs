//! Removing unused code from the vendor directory.
//!
//! Each pass deletes excluded paths, Go files of packages nothing imports,
//! test files, unreachable directories and finally empty directories. Passes
//! repeat until one removes nothing, since every removal can shrink the import
//! graph further.

use crate::graph::{parent_packages, PackageSet, Resolver};
use crate::manifest::Import;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Totals over all passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub passes: usize,
    pub excluded: usize,
    pub files: usize,
    pub dirs: usize,
    pub empty_dirs: usize,
    /// Pins whose directory no longer exists under the vendor dir.
    pub missing_pins: Vec<String>,
}

impl PruneReport {
    #[must_use]
    pub fn removed(&self) -> usize {
        self.excluded + self.files + self.dirs + self.empty_dirs
    }
}

/// Prunes one vendor directory.
pub struct Pruner<'a> {
    resolver: &'a Resolver,
    vendor_dir: &'a Path,
    excludes: HashSet<String>,
    manifest_name: String,
}

impl<'a> Pruner<'a> {
    /// `resolver` must use `vendor_dir` as its library root.
    #[must_use]
    pub fn new(resolver: &'a Resolver, vendor_dir: &'a Path, excludes: &[String]) -> Self {
        Self {
            resolver,
            vendor_dir,
            excludes: excludes
                .iter()
                .map(|e| e.trim().trim_matches('/').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            manifest_name: "manifest".to_string(),
        }
    }

    /// Name of the manifest, for the warnings about vanished pins.
    #[must_use]
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Prune until a fixpoint, then warn about pins that ended up unused.
    pub fn run(&self, pins: &[Import]) -> PruneReport {
        let mut report = PruneReport::default();

        loop {
            report.passes += 1;
            let live = self.resolver.collect_imports();

            let excluded = self.remove_excludes();
            let (files, dirs) = self.remove_unused(&live);
            let empty_dirs = self.remove_empty_dirs();
            debug!(
                pass = report.passes,
                excluded, files, dirs, empty_dirs, "prune pass"
            );

            report.excluded += excluded;
            report.files += files;
            report.dirs += dirs;
            report.empty_dirs += empty_dirs;
            if excluded + files + dirs + empty_dirs == 0 {
                break;
            }
        }

        for pin in pins {
            let dir = pin
                .package
                .split('/')
                .fold(self.vendor_dir.to_path_buf(), |dir, part| dir.join(part));
            match fs::symlink_metadata(&dir) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(
                        "Package '{}' has been completely removed: it's probably useless (in {})",
                        pin.package, self.manifest_name
                    );
                    report.missing_pins.push(pin.package.clone());
                }
                Err(e) => error!("Could not stat '{}': {e}", dir.display()),
            }
        }

        info!(
            passes = report.passes,
            removed = report.removed(),
            "Pruned '{}'",
            self.vendor_dir.display()
        );
        report
    }

    fn remove_excludes(&self) -> usize {
        if self.excludes.is_empty() {
            return 0;
        }
        let mut count = 0;
        let mut it = WalkDir::new(self.vendor_dir).follow_links(false).into_iter();
        while let Some(entry) = it.next() {
            let Some(entry) = walk_entry(entry) else {
                continue;
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(rel) = trash_util::fs::slash_relative(self.vendor_dir, entry.path()) else {
                continue;
            };
            if !self.excludes.contains(&rel) {
                continue;
            }
            info!("Removing excluded '{rel}'");
            if entry.file_type().is_dir() {
                if remove(fs::remove_dir_all(entry.path()), entry.path()) {
                    count += 1;
                }
                it.skip_current_dir();
            } else if remove(fs::remove_file(entry.path()), entry.path()) {
                count += 1;
            }
        }
        count
    }

    /// Remove test files, Go files of unused packages and directories not on
    /// the path to any used package. Returns `(files, dirs)`.
    fn remove_unused(&self, live: &PackageSet) -> (usize, usize) {
        let mut keep_dirs = PackageSet::new();
        for package in live {
            keep_dirs.merge(&parent_packages("", package));
        }

        let mut files = 0;
        let mut dirs = 0;
        let mut it = WalkDir::new(self.vendor_dir).follow_links(false).into_iter();
        while let Some(entry) = it.next() {
            let Some(entry) = walk_entry(entry) else {
                continue;
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(rel) = trash_util::fs::slash_relative(self.vendor_dir, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                if !keep_dirs.contains(&rel) {
                    debug!("Removing unused dir '{rel}'");
                    if remove(fs::remove_dir_all(entry.path()), entry.path()) {
                        dirs += 1;
                    }
                    it.skip_current_dir();
                }
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let package = rel.rsplit_once('/').map_or("", |(dir, _)| dir);
            let unused_go = name.ends_with(".go") && !live.contains(package);
            if name.ends_with("_test.go") || unused_go {
                debug!("Removing unused file '{rel}'");
                if remove(fs::remove_file(entry.path()), entry.path()) {
                    files += 1;
                }
            }
        }
        (files, dirs)
    }

    fn remove_empty_dirs(&self) -> usize {
        let mut total = 0;
        loop {
            let mut count = 0;
            let mut it = WalkDir::new(self.vendor_dir).follow_links(false).into_iter();
            while let Some(entry) = it.next() {
                let Some(entry) = walk_entry(entry) else {
                    continue;
                };
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    continue;
                }
                if fs::remove_dir(entry.path()).is_ok() {
                    debug!("Removed empty dir '{}'", entry.path().display());
                    count += 1;
                    it.skip_current_dir();
                }
            }
            if count == 0 {
                return total;
            }
            total += count;
        }
    }
}

fn walk_entry(entry: walkdir::Result<walkdir::DirEntry>) -> Option<walkdir::DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            let missing = e
                .io_error()
                .is_some_and(|io| io.kind() == io::ErrorKind::NotFound);
            if !missing {
                error!("Error walking vendor directory: {e}");
            }
            None
        }
    }
}

fn remove(result: io::Result<()>, path: &Path) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!("Error removing '{}': {e}", path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::PlatformVariant;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolver(root: &Path) -> Resolver {
        Resolver::new("example.com/app", root).with_platforms(vec![PlatformVariant::Any])
    }

    #[test]
    fn test_prune_keeps_imported_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let vendor = root.join("vendor");

        write(&root.join("main.go"), "package main\nimport \"github.com/x/x\"\n");
        write(&vendor.join("github.com/x/x/x.go"), "package x\nimport \"github.com/y/y/sub\"\n");
        write(&vendor.join("github.com/x/x/x_test.go"), "package x\nimport \"github.com/z/z\"\n");
        write(&vendor.join("github.com/x/x/LICENSE"), "MIT\n");
        write(&vendor.join("github.com/x/x/unused/u.go"), "package unused\n");
        write(&vendor.join("github.com/y/y/y.go"), "package y\n");
        write(&vendor.join("github.com/y/y/README.md"), "readme\n");
        write(&vendor.join("github.com/y/y/sub/sub.go"), "package sub\n");
        write(&vendor.join("github.com/z/z/z.go"), "package z\n");

        let r = resolver(root);
        let pins = [
            Import::new("github.com/x/x"),
            Import::new("github.com/y/y"),
            Import::new("github.com/z/z"),
        ];
        let report = Pruner::new(&r, &vendor, &[]).run(&pins);

        assert!(vendor.join("github.com/x/x/x.go").is_file());
        assert!(vendor.join("github.com/x/x/LICENSE").is_file());
        assert!(!vendor.join("github.com/x/x/x_test.go").exists());
        assert!(!vendor.join("github.com/x/x/unused").exists());
        assert!(vendor.join("github.com/y/y/sub/sub.go").is_file());
        assert!(vendor.join("github.com/y/y/README.md").is_file());
        // y itself is only a parent of the used package: its Go files go.
        assert!(!vendor.join("github.com/y/y/y.go").exists());
        assert!(!vendor.join("github.com/z").exists());

        // y survives through its subpackage; only z is gone.
        assert_eq!(report.missing_pins, ["github.com/z/z"]);
        assert!(report.passes >= 2);
    }

    #[test]
    fn test_repo_pin_used_through_subpackage_is_not_missing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let vendor = root.join("vendor");

        write(
            &root.join("main.go"),
            "package main\nimport \"golang.org/x/net/context\"\n",
        );
        write(&vendor.join("golang.org/x/net/LICENSE"), "BSD\n");
        write(&vendor.join("golang.org/x/net/context/c.go"), "package context\n");

        let r = resolver(root);
        let report = Pruner::new(&r, &vendor, &[])
            .with_manifest_name("vendor.conf")
            .run(&[Import::new("golang.org/x/net")]);

        assert!(vendor.join("golang.org/x/net/LICENSE").is_file());
        assert!(vendor.join("golang.org/x/net/context/c.go").is_file());
        assert!(report.missing_pins.is_empty());
    }

    #[test]
    fn test_prune_excludes_and_second_pass_is_noop() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let vendor = root.join("vendor");

        write(&root.join("main.go"), "package main\nimport \"github.com/x/x\"\n");
        write(&vendor.join("github.com/x/x/x.go"), "package x\n");
        write(&vendor.join("github.com/x/x/testdata/big.bin"), "data\n");

        let r = resolver(root);
        let excludes = vec!["github.com/x/x/testdata/".to_string()];
        let first = Pruner::new(&r, &vendor, &excludes).run(&[Import::new("github.com/x/x")]);
        assert_eq!(first.excluded, 1);
        assert!(!vendor.join("github.com/x/x/testdata").exists());
        assert!(first.missing_pins.is_empty());

        let second = Pruner::new(&r, &vendor, &excludes).run(&[Import::new("github.com/x/x")]);
        assert_eq!(second.removed(), 0);
        assert_eq!(second.passes, 1);
    }

    #[test]
    fn test_empty_dirs_are_removed_bottom_up() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let vendor = root.join("vendor");
        write(&root.join("main.go"), "package main\nimport \"github.com/x/x\"\n");
        write(&vendor.join("github.com/x/x/x.go"), "package x\n");
        fs::create_dir_all(vendor.join("github.com/x/x/a/b/c")).unwrap();

        let r = resolver(root);
        let report = Pruner::new(&r, &vendor, &[]).run(&[]);
        assert!(!vendor.join("github.com/x/x/a").exists());
        assert!(vendor.join("github.com/x/x/x.go").is_file());
        assert!(report.removed() > 0);
    }
}
