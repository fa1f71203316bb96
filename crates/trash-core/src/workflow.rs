//! Top-level operations: vendor, clean and update.

use crate::cache::{CommandRunner, RepoCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::Resolver;
use crate::manifest::{Manifest, ManifestFormat};
use crate::paths;
use crate::prune::{PruneReport, Pruner};
use crate::vendor::materialize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of [`vendor`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct VendorReport {
    pub root_package: String,
    pub vendored: usize,
    pub files_copied: u64,
    /// Absent when pruning was skipped (`keep`).
    pub prune: Option<PruneReport>,
}

/// Outcome of [`update`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub root_package: String,
    pub pins: usize,
    pub manifest: PathBuf,
}

/// Locate and parse the project's manifest.
///
/// In update mode a missing manifest is not an error: an empty one is
/// returned, to be written at the requested path.
pub fn open_manifest(config: &Config) -> Result<Manifest> {
    if let Some(path) = paths::find_manifest(&config.dir, &config.manifest_file) {
        info!("Trying to read manifest: {}", path.display());
        return Manifest::load(&path);
    }

    let requested = config.manifest_path();
    if config.update {
        warn!("No manifest found, creating '{}'", requested.display());
        return Ok(Manifest::new(format_for(&requested)).with_source(requested));
    }
    Err(Error::config(format!(
        "no manifest found in {} (looked for {} and {})",
        config.dir.display(),
        config.manifest_file.display(),
        paths::MANIFEST_CANDIDATES.join(", ")
    )))
}

fn format_for(path: &Path) -> ManifestFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml" | "yaml") => ManifestFormat::Structured,
        _ => ManifestFormat::Flat,
    }
}

/// The manifest's root package, or one guessed from GOPATH.
pub fn root_package(config: &Config, manifest: &Manifest) -> Result<String> {
    if !manifest.root_package.is_empty() {
        return Ok(manifest.root_package.clone());
    }
    let guessed = paths::guess_root_package(&config.dir, config.gopath.as_deref())?;
    info!("Using '{guessed}' as the project's root package (from GOPATH)");
    Ok(guessed)
}

/// Reject pins that cannot be vendored, before anything is fetched.
pub fn validate(manifest: &Manifest, require_versions: bool) -> Result<()> {
    for import in &manifest.imports {
        let bad_path = import.package.is_empty()
            || import.package.contains('\\')
            || import
                .package
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..");
        if bad_path {
            return Err(Error::config(format!(
                "invalid package path '{}' in {}",
                import.package,
                manifest.source_display()
            )));
        }
        if require_versions && import.version.is_empty() {
            return Err(Error::config(format!(
                "package '{}' has no version in {}",
                import.package,
                manifest.source_display()
            )));
        }
    }
    Ok(())
}

/// Fail early when `git` is not installed.
pub fn require_git() -> Result<PathBuf> {
    which::which("git").map_err(|e| Error::config(format!("git is required: {e}")))
}

fn open_cache(config: &Config) -> RepoCache {
    RepoCache::new(&config.cache_dir).insecure(config.insecure)
}

/// Fetch every pin, copy it into the vendor directory and prune.
pub fn vendor(config: &Config, manifest: &Manifest) -> Result<VendorReport> {
    require_git()?;
    vendor_with(config, manifest, &open_cache(config))
}

/// [`vendor`] with an explicit cache.
pub fn vendor_with<R: CommandRunner>(
    config: &Config,
    manifest: &Manifest,
    cache: &RepoCache<R>,
) -> Result<VendorReport> {
    validate(manifest, true)?;
    let root = root_package(config, manifest)?;

    for import in &manifest.imports {
        cache.prepare(import)?;
    }

    let vendor_dir = config.vendor_dir();
    let files_copied = materialize(cache, &manifest.imports, &vendor_dir, config.keep)?;

    let prune = if config.keep {
        None
    } else {
        Some(prune_vendor(config, manifest, &root))
    };

    Ok(VendorReport {
        root_package: root,
        vendored: manifest.imports.len(),
        files_copied,
        prune,
    })
}

/// Prune the existing vendor directory without fetching anything.
pub fn clean(config: &Config, manifest: &Manifest) -> Result<PruneReport> {
    let root = root_package(config, manifest)?;
    let vendor_dir = config.vendor_dir();
    if !vendor_dir.is_dir() {
        warn!("Nothing to clean: '{}' does not exist", vendor_dir.display());
        return Ok(PruneReport::default());
    }
    Ok(prune_vendor(config, manifest, &root))
}

fn prune_vendor(config: &Config, manifest: &Manifest, root: &str) -> PruneReport {
    let vendor_dir = config.vendor_dir();
    let resolver = Resolver::new(root, &config.dir)
        .with_lib_root(&vendor_dir)
        .with_target_dir(&vendor_dir)
        .with_platforms(config.platforms.clone());
    Pruner::new(&resolver, &vendor_dir, &manifest.excludes)
        .with_manifest_name(manifest.source_display())
        .run(&manifest.imports)
}

/// Regenerate the manifest from the code and write it back.
pub fn update(config: &Config) -> Result<UpdateReport> {
    require_git()?;
    update_with(config, &open_cache(config))
}

/// [`update`] with an explicit cache.
pub fn update_with<R: CommandRunner>(config: &Config, cache: &RepoCache<R>) -> Result<UpdateReport> {
    let mut manifest = open_manifest(config)?;
    validate(&manifest, false)?;
    let root = root_package(config, &manifest)?;

    let pins = crate::update::update(config, &mut manifest, cache, &root)?;

    let destination = manifest
        .source()
        .map_or_else(|| config.manifest_path(), Path::to_path_buf);
    manifest.dump(&destination)?;
    info!("Wrote {} pins to '{}'", pins, destination.display());

    Ok(UpdateReport {
        root_package: root,
        pins,
        manifest: destination,
    })
}
