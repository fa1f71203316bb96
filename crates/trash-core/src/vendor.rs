//! Copying checked out cache entries into the vendor directory.

use crate::cache::{CommandRunner, RepoCache};
use crate::error::{Error, Result};
use crate::manifest::Import;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Recreate `vendor_dir` from the cache entries of `imports`.
///
/// Unless `keep` is set all `.git` directories are stripped from the result.
pub fn materialize<R: CommandRunner>(
    cache: &RepoCache<R>,
    imports: &[Import],
    vendor_dir: &Path,
    keep: bool,
) -> Result<u64> {
    match fs::remove_dir_all(vendor_dir) {
        Ok(()) => debug!("Removed {}", vendor_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::filesystem(vendor_dir, e)),
    }
    fs::create_dir_all(vendor_dir).map_err(|e| Error::filesystem(vendor_dir, e))?;

    let mut copied = 0;
    for import in imports {
        let src = cache.entry_path(&import.package);
        let dst = import
            .package
            .split('/')
            .fold(vendor_dir.to_path_buf(), |dir, part| dir.join(part));
        info!("Copying '{}' to '{}'", src.display(), dst.display());
        copied += trash_util::fs::copy_dir_all(&src, &dst).map_err(|e| Error::filesystem(&dst, e))?;
    }

    if !keep {
        let removed = trash_util::fs::remove_dirs_named(vendor_dir, ".git")
            .map_err(|e| Error::filesystem(vendor_dir, e))?;
        debug!(count = removed.len(), "stripped .git directories");
    }

    Ok(copied)
}
