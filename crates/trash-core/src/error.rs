use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, one per error class.
pub mod codes {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const MANIFEST_PARSE_FAILED: &str = "MANIFEST_PARSE_FAILED";
    pub const SOURCE_PARSE_FAILED: &str = "SOURCE_PARSE_FAILED";
    pub const CACHE_CORRUPT: &str = "CACHE_CORRUPT";
    pub const VCS_FAILED: &str = "VCS_FAILED";
    pub const FS_FAILED: &str = "FS_FAILED";
}

/// Core error type for trash operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    SourceParse { path: PathBuf, message: String },

    #[error("Cache entry {path} is unusable: {message}")]
    Cache { path: PathBuf, message: String },

    #[error("`{command}` failed in {dir}:\n{output}")]
    VersionControl {
        command: String,
        dir: PathBuf,
        output: String,
    },

    #[error("Filesystem operation failed at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => codes::CONFIG_INVALID,
            Self::ManifestParse { .. } => codes::MANIFEST_PARSE_FAILED,
            Self::SourceParse { .. } => codes::SOURCE_PARSE_FAILED,
            Self::Cache { .. } => codes::CACHE_CORRUPT,
            Self::VersionControl { .. } => codes::VCS_FAILED,
            Self::Filesystem { .. } => codes::FS_FAILED,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
