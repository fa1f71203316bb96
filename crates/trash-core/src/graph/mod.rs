//! Transitive import graph over the project and a library tree.
//!
//! Project packages are found by walking the project directory. Their imports
//! are looked up under a library root (the vendor directory when pruning, the
//! cache's `src` when updating) and scanned in turn until nothing new appears.

mod set;

pub use set::PackageSet;

use crate::scan::{self, PackageScan, PlatformVariant};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Whether `package` is `root` or below it.
#[must_use]
pub fn is_within_root(package: &str, root: &str) -> bool {
    !root.is_empty()
        && (package == root
            || package
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('/')))
}

/// `path` and each of its ancestors that is strictly longer than `root`.
///
/// `parent_packages("a", "a/b/c/d")` is `{a/b, a/b/c, a/b/c/d}`.
#[must_use]
pub fn parent_packages(root: &str, path: &str) -> PackageSet {
    let mut result = PackageSet::new();
    let mut current = path;
    while current.len() > root.len() {
        result.insert(current);
        current = current.rfind('/').map_or("", |i| &current[..i]);
    }
    result
}

/// Computes the closure of packages reachable from a project.
#[derive(Debug, Clone)]
pub struct Resolver {
    root_package: String,
    project_dir: PathBuf,
    lib_root: PathBuf,
    target_dir: PathBuf,
    platforms: Vec<PlatformVariant>,
}

impl Resolver {
    /// Resolve `root_package` located at `project_dir`, with its libraries in
    /// `project_dir/vendor`.
    #[must_use]
    pub fn new(root_package: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let vendor = project_dir.join("vendor");
        Self {
            root_package: root_package.into(),
            lib_root: vendor.clone(),
            target_dir: vendor,
            project_dir,
            platforms: PlatformVariant::defaults(),
        }
    }

    /// Where non-project packages are looked up.
    #[must_use]
    pub fn with_lib_root(mut self, lib_root: impl Into<PathBuf>) -> Self {
        self.lib_root = lib_root.into();
        self
    }

    /// Directory excluded when listing project packages.
    #[must_use]
    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    /// Platforms to scan; an empty list means [`PlatformVariant::Any`].
    #[must_use]
    pub fn with_platforms(mut self, platforms: Vec<PlatformVariant>) -> Self {
        self.platforms = if platforms.is_empty() {
            vec![PlatformVariant::Any]
        } else {
            platforms
        };
        self
    }

    #[must_use]
    pub fn root_package(&self) -> &str {
        &self.root_package
    }

    #[must_use]
    pub fn lib_root(&self) -> &Path {
        &self.lib_root
    }

    /// Directory holding the sources of `package`.
    #[must_use]
    pub fn package_dir(&self, package: &str) -> PathBuf {
        if package == self.root_package {
            return self.project_dir.clone();
        }
        match package.strip_prefix(&self.root_package) {
            Some(rest) if !self.root_package.is_empty() && rest.starts_with('/') => {
                join_slash(&self.project_dir, &rest[1..])
            }
            _ => join_slash(&self.lib_root, package),
        }
    }

    /// Every package directory of the project, outside the target directory
    /// and hidden directories.
    #[must_use]
    pub fn list_packages(&self) -> PackageSet {
        let mut packages = PackageSet::new();
        let walker = WalkDir::new(&self.project_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !(e.path() == self.target_dir
                        || e.file_name().to_string_lossy().starts_with('.'))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error walking {}: {e}", self.project_dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_dir() || !scan::is_package_dir(entry.path()) {
                continue;
            }
            match trash_util::fs::slash_relative(&self.project_dir, entry.path()) {
                Some(rel) if rel.is_empty() => {
                    packages.insert(self.root_package.clone());
                }
                Some(rel) if self.root_package.is_empty() => {
                    packages.insert(rel);
                }
                Some(rel) => {
                    packages.insert(format!("{}/{rel}", self.root_package));
                }
                None => {}
            }
        }

        debug!(count = packages.len(), "listed project packages");
        packages
    }

    /// The transitive closure of non-standard imports of the project,
    /// project packages included, across all configured platforms.
    #[must_use]
    pub fn collect_imports(&self) -> PackageSet {
        info!("Collecting packages in '{}'", self.root_package);

        let mut imports = self.list_packages();
        let mut seen = PackageSet::new();
        let mut frontier = imports.clone();

        while !frontier.is_empty() {
            let found = self.scan_all(&frontier);
            imports.merge(&found);
            seen.merge(&frontier);
            frontier = imports
                .iter()
                .filter(|p| !seen.contains(p))
                .cloned()
                .collect();
        }

        debug!(count = imports.len(), "collected imports");
        imports
    }

    fn scan_all(&self, packages: &PackageSet) -> PackageSet {
        let jobs: Vec<(&str, &PlatformVariant)> = packages
            .iter()
            .flat_map(|package| {
                self.platforms
                    .iter()
                    .map(move |platform| (package.as_str(), platform))
            })
            .collect();

        jobs.par_iter()
            .map(|(package, platform)| self.scan_one(package, platform))
            .reduce(PackageSet::new, PackageSet::union)
    }

    fn scan_one(&self, package: &str, platform: &PlatformVariant) -> PackageSet {
        let filter = if is_within_root(package, &self.root_package) {
            scan::all_files
        } else {
            scan::skip_tests
        };
        let dir = self.package_dir(package);
        PackageScan {
            package,
            dir: &dir,
            root_package: &self.root_package,
            filter,
        }
        .imports(platform)
    }
}

fn join_slash(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |dir, part| dir.join(part))
}
