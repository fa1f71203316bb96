//! Regenerating the manifest from what the code imports.
//!
//! Imports are resolved against the cache's `src` tree. Every newly found
//! package is fetched (at its pinned version, or `master`) and scanned in turn
//! until the set stops growing; the manifest then lists one pin per
//! repository with the version `git describe` reports.

use crate::cache::{CommandRunner, RepoCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::{is_within_root, Resolver};
use crate::manifest::{Import, Manifest, TRACKING_BRANCH};
use std::collections::HashSet;
use tracing::{debug, info};

/// Rewrite `manifest.imports` from the project's import graph.
///
/// Returns the number of pins written.
pub fn update<R: CommandRunner>(
    config: &Config,
    manifest: &mut Manifest,
    cache: &RepoCache<R>,
    root_package: &str,
) -> Result<usize> {
    let src = cache.src_dir();
    std::fs::create_dir_all(&src).map_err(|e| Error::filesystem(&src, e))?;

    let resolver = Resolver::new(root_package, &config.dir)
        .with_lib_root(&src)
        .with_target_dir(config.vendor_dir())
        .with_platforms(config.platforms.clone());

    let mut prepared: HashSet<String> = HashSet::new();
    let mut imports = resolver.collect_imports();
    loop {
        let before = imports.len();
        for package in &imports {
            if is_within_root(package, root_package) || prepared.contains(package) {
                continue;
            }
            let pin = discovery_pin(manifest, package);
            debug!("Fetching '{}' at '{}'", pin.package, pin.version);
            cache.prepare(&pin)?;
            prepared.insert(package.clone());
        }
        imports = resolver.collect_imports();
        if imports.len() <= before {
            break;
        }
    }

    let mut pins: Vec<Import> = Vec::new();
    let mut repos: HashSet<String> = HashSet::new();
    for package in &imports {
        if is_within_root(package, root_package) {
            continue;
        }
        let top = cache.top_level(package)?;
        if !repos.insert(top.clone()) {
            continue;
        }
        let mut pin = manifest
            .get(&top)
            .cloned()
            .unwrap_or_else(|| Import::new(top.as_str()));
        pin.version = cache.describe(&top)?;
        info!("Pinning '{}' at '{}'", pin.package, pin.version);
        pins.push(pin);
    }

    let count = pins.len();
    manifest.root_package = root_package.to_string();
    manifest.imports = pins;
    manifest.dedupe();
    Ok(count)
}

/// The pin used to fetch `package` while discovering: the manifest's pin
/// when there is one, `master` when it has no version.
fn discovery_pin(manifest: &Manifest, package: &str) -> Import {
    let mut pin = manifest
        .get(package)
        .cloned()
        .unwrap_or_else(|| Import::new(package));
    if pin.version.is_empty() {
        pin.version = TRACKING_BRANCH.to_string();
    }
    pin
}
