use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache location.
pub const CACHE_DIR_ENV: &str = "TRASH_CACHE";

/// Manifest file names tried, in order, after the requested one.
pub const MANIFEST_CANDIDATES: &[&str] = &[
    "vendor.conf",
    "trash.conf",
    "vndr.cfg",
    "vendor.manifest",
    "trash.yml",
    "glide.yaml",
    "glide.yml",
    "trash.yaml",
];

/// Default cache root: `~/.trash-cache`.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs_next::home_dir().map_or_else(|| PathBuf::from(".trash-cache"), |p| p.join(".trash-cache"))
}

/// Find the manifest for the project in `dir`: `requested` if it exists,
/// otherwise the first existing file of [`MANIFEST_CANDIDATES`].
#[must_use]
pub fn find_manifest(dir: &Path, requested: &Path) -> Option<PathBuf> {
    std::iter::once(requested.to_path_buf())
        .chain(MANIFEST_CANDIDATES.iter().map(PathBuf::from))
        .map(|name| if name.is_absolute() { name } else { dir.join(name) })
        .find(|path| path.is_file())
}

/// Derive the project's import path from its location under GOPATH.
///
/// Only a single-entry GOPATH is supported, and `dir` must be below its `src`.
pub fn guess_root_package(dir: &Path, gopath: Option<&str>) -> Result<String> {
    let gopath = gopath.filter(|g| !g.is_empty()).ok_or_else(|| {
        Error::config("no root package in the manifest and GOPATH is not set")
    })?;

    let entries: Vec<PathBuf> = std::env::split_paths(gopath)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    let [entry] = entries.as_slice() else {
        return Err(Error::config(format!(
            "cannot guess the root package with multiple GOPATH entries ({gopath}); name it in the manifest"
        )));
    };

    let src = canonical(&entry.join("src"));
    let dir = canonical(dir);
    match trash_util::fs::slash_relative(&src, &dir) {
        Some(rel) if !rel.is_empty() => Ok(rel),
        _ => Err(Error::config(format!(
            "{} is not inside {}; name the root package in the manifest",
            dir.display(),
            src.display()
        ))),
    }
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
