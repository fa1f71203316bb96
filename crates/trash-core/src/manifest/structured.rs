//! YAML manifest format (`trash.yml`, `glide.yaml`).

use super::{Import, Manifest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    #[serde(default, rename = "import", skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
    #[serde(default, rename = "exclude", skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
}

pub(super) enum Sniff {
    Document(Document),
    /// Looks like YAML (top-level manifest key) but does not decode.
    Invalid(String),
    NotStructured,
}

const TOP_LEVEL_KEYS: [&str; 3] = ["package:", "import:", "exclude:"];

/// Decide the manifest format by a trial decode.
pub(super) fn sniff(text: &str) -> Sniff {
    let meaningful: Vec<&str> = text
        .lines()
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .collect();
    if meaningful.is_empty() {
        return Sniff::NotStructured;
    }

    match serde_yaml::from_str::<Document>(text) {
        Ok(doc) => Sniff::Document(doc),
        Err(e) => {
            let looks_structured = meaningful
                .iter()
                .any(|l| TOP_LEVEL_KEYS.iter().any(|k| l.starts_with(k)));
            if looks_structured {
                Sniff::Invalid(e.to_string())
            } else {
                Sniff::NotStructured
            }
        }
    }
}

pub(super) fn write(manifest: &Manifest) -> Result<String, String> {
    let doc = Document {
        package: manifest.root_package.clone(),
        imports: manifest.imports.clone(),
        excludes: manifest.excludes.clone(),
        packages: manifest.packages.clone(),
    };
    serde_yaml::to_string(&doc).map_err(|e| e.to_string())
}
