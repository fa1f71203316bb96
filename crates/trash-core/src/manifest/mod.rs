//! Manifest model: the list of pinned packages to vendor.
//!
//! A manifest is read in one of two formats (see [`ManifestFormat`]). The format
//! is detected once when parsing and carried with the manifest so that
//! [`Manifest::dump`] writes back the same shape.

mod flat;
mod structured;

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Branch used when a pin has no version in update mode, and the branch whose
/// checkout may fall back to the newest known commit.
pub const TRACKING_BRANCH: &str = "master";

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "vendor.conf";

/// Per-import boolean flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default, skip_serializing_if = "is_false")]
    pub transitive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub staging: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

impl ImportOptions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.transitive && !self.staging
    }
}

/// One pinned external package.
///
/// Identity is the import path alone: two imports with the same `package`
/// compare equal whatever their versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Import {
    #[serde(default, deserialize_with = "scalar_string")]
    pub package: String,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub version: String,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub repo: String,
    #[serde(flatten)]
    pub options: ImportOptions,
}

impl Import {
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }
}

impl PartialEq for Import {
    fn eq(&self, other: &Self) -> bool {
        self.package == other.package
    }
}

impl Eq for Import {}

impl Hash for Import {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package.hash(state);
    }
}

/// Accept any YAML scalar (`version: 1.0`, `version: 2`) as a string.
///
/// Unquoted numbers are rendered from their parsed value, so `1.10` reads as
/// `1.1`. Versions like that must be quoted in the manifest.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

/// Which on-disk shape a manifest was read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestFormat {
    /// YAML document with `package`, `import` and `exclude` keys.
    Structured,
    /// Whitespace-separated lines.
    #[default]
    Flat,
}

/// The parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Import path of the project itself.
    pub root_package: String,
    /// Pins, sorted by package after [`Manifest::dedupe`].
    pub imports: Vec<Import>,
    /// Paths (relative to the vendor dir) removed unconditionally when pruning.
    pub excludes: Vec<String>,
    /// `package=` entries. Carried through to `dump`, never vendored.
    pub packages: Vec<String>,
    index: HashMap<String, usize>,
    format: ManifestFormat,
    source: Option<PathBuf>,
}

impl Manifest {
    /// Create an empty manifest that will be written in `format`.
    #[must_use]
    pub fn new(format: ManifestFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Remember `path` as the manifest's location.
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Parse manifest text, detecting its format.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_from(text, None)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| Error::ManifestParse {
            path: path.to_path_buf(),
            message: format!("not valid UTF-8: {e}"),
        })?;
        Self::parse_from(&text, Some(path))
    }

    fn parse_from(text: &str, source: Option<&Path>) -> Result<Self> {
        let mut manifest = match structured::sniff(text) {
            structured::Sniff::Document(doc) => {
                let mut m = Self::new(ManifestFormat::Structured);
                m.root_package = doc.package;
                m.imports = doc.imports;
                m.excludes = doc.excludes;
                m.packages = doc.packages;
                m
            }
            structured::Sniff::Invalid(message) => {
                return Err(Error::ManifestParse {
                    path: source.map_or_else(|| PathBuf::from("<input>"), Path::to_path_buf),
                    message,
                });
            }
            structured::Sniff::NotStructured => flat::parse(text),
        };
        manifest.source = source.map(Path::to_path_buf);
        debug!(
            format = ?manifest.format,
            imports = manifest.imports.len(),
            excludes = manifest.excludes.len(),
            "parsed manifest"
        );
        manifest.dedupe();
        Ok(manifest)
    }

    /// Drop duplicate packages (first occurrence wins) and sort by package.
    pub fn dedupe(&mut self) {
        let origin = self.source_display();
        let mut first: HashMap<String, Import> = HashMap::with_capacity(self.imports.len());
        for import in self.imports.drain(..) {
            if first.contains_key(&import.package) {
                warn!("Package '{}' has duplicates (in {origin})", import.package);
                continue;
            }
            first.insert(import.package.clone(), import);
        }

        let mut imports: Vec<Import> = first.into_values().collect();
        imports.sort_by(|a, b| a.package.cmp(&b.package));

        self.index = imports
            .iter()
            .enumerate()
            .map(|(i, import)| (import.package.clone(), i))
            .collect();
        self.imports = imports;
    }

    /// Look up a pin by package path.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&Import> {
        self.index.get(package).map(|&i| &self.imports[i])
    }

    #[must_use]
    pub fn format(&self) -> ManifestFormat {
        self.format
    }

    /// Path this manifest was loaded from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Human readable origin for log lines.
    #[must_use]
    pub fn source_display(&self) -> String {
        self.source
            .as_ref()
            .map_or_else(|| "manifest".to_string(), |p| p.display().to_string())
    }

    /// Render the manifest in the format it was read in.
    pub fn serialize(&self) -> Result<String> {
        match self.format {
            ManifestFormat::Flat => Ok(flat::write(self)),
            ManifestFormat::Structured => {
                structured::write(self).map_err(|message| Error::ManifestParse {
                    path: self.source.clone().unwrap_or_default(),
                    message,
                })
            }
        }
    }

    /// Write the manifest to `destination`, atomically.
    pub fn dump(&self, destination: &Path) -> Result<()> {
        let text = self.serialize()?;
        trash_util::fs::atomic_write(destination, text.as_bytes())
            .map_err(|e| Error::filesystem(destination, e))
    }
}
