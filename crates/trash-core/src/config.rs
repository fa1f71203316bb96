use crate::manifest::DEFAULT_MANIFEST;
use crate::scan::PlatformVariant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration for one trash invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project directory.
    pub dir: PathBuf,

    /// Requested manifest file name, relative to `dir`.
    pub manifest_file: PathBuf,

    /// Vendor directory, relative to `dir`.
    pub target: PathBuf,

    /// Repository cache root.
    pub cache_dir: PathBuf,

    /// GOPATH used to guess the root package when the manifest has none.
    pub gopath: Option<String>,

    /// Keep `.git` directories and skip pruning.
    pub keep: bool,

    /// Regenerate the manifest from the code instead of vendoring.
    pub update: bool,

    /// Allow insecure protocols when fetching with the toolchain.
    pub insecure: bool,

    /// Platforms whose build constraints are evaluated.
    pub platforms: Vec<PlatformVariant>,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Whether to emit JSON logs.
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            manifest_file: PathBuf::from(DEFAULT_MANIFEST),
            target: PathBuf::from("vendor"),
            cache_dir: crate::paths::default_cache_dir(),
            gopath: None,
            keep: false,
            update: false,
            insecure: false,
            platforms: PlatformVariant::defaults(),
            verbosity: 0,
            json_logs: false,
        }
    }
}

impl Config {
    /// Create a new config for the project in `dir`.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_manifest_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.manifest_file = file.into();
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    #[must_use]
    pub fn with_gopath(mut self, gopath: Option<String>) -> Self {
        self.gopath = gopath.filter(|g| !g.is_empty());
        self
    }

    #[must_use]
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    #[must_use]
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set platforms; an empty list keeps the defaults.
    #[must_use]
    pub fn with_platforms(mut self, platforms: Vec<PlatformVariant>) -> Self {
        if !platforms.is_empty() {
            self.platforms = platforms;
        }
        self
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Absolute vendor directory.
    #[must_use]
    pub fn vendor_dir(&self) -> PathBuf {
        resolve(&self.dir, &self.target)
    }

    /// Path the requested manifest file would have.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        resolve(&self.dir, &self.manifest_file)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
