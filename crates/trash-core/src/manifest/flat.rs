//! Line-oriented manifest format.
//!
//! ```text
//! # the first single-field line names the project
//! github.com/me/project
//!
//! github.com/pkg/errors      v0.8.0
//! golang.org/x/net           a1b2c3d  https://github.com/golang/net.git
//! k8s.io/api                 v0.20.0  transitive=true,staging=true
//! package=k8s.io/api/staging
//! -golang.org/x/net/html/testdata
//! ```

use super::{Import, ImportOptions, Manifest, ManifestFormat};
use std::fmt::Write;
use tracing::{debug, info};

pub(super) fn parse(text: &str) -> Manifest {
    let mut manifest = Manifest::new(ManifestFormat::Flat);

    for raw in text.lines() {
        let line = raw.find('#').map_or(raw, |start| &raw[..start]).trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() == 1 && manifest.root_package.is_empty() {
            manifest.root_package = fields[0].to_string();
            info!("Using '{}' as the project's root package", manifest.root_package);
            continue;
        }

        if let Some(pattern) = fields[0].strip_prefix('-') {
            manifest.excludes.push(pattern.trim().to_string());
            continue;
        }

        if let Some(package) = fields[0].strip_prefix("package=") {
            debug!("Listed package '{package}' is not a pin");
            manifest.packages.push(package.to_string());
            continue;
        }

        let mut import = Import::new(fields[0]);
        if let Some(version) = fields.get(1) {
            import.version = (*version).to_string();
        }
        if let Some(third) = fields.get(2) {
            if third.contains('=') {
                import.options = parse_options(third);
            } else {
                import.repo = (*third).to_string();
            }
        }
        if let Some(fourth) = fields.get(3) {
            import.options = parse_options(fourth);
        }
        manifest.imports.push(import);
    }

    manifest
}

/// Parse `key=value,key=value`. Only `true` values of known keys set anything.
pub(super) fn parse_options(text: &str) -> ImportOptions {
    let mut options = ImportOptions::default();
    for part in text.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if value != "true" {
            continue;
        }
        match key {
            "transitive" => options.transitive = true,
            "staging" => options.staging = true,
            _ => {}
        }
    }
    options
}

fn format_options(options: ImportOptions) -> String {
    let mut parts = Vec::new();
    if options.transitive {
        parts.push("transitive=true");
    }
    if options.staging {
        parts.push("staging=true");
    }
    parts.join(",")
}

pub(super) fn write(manifest: &Manifest) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# package");
    let _ = writeln!(out, "{}", manifest.root_package);

    if !manifest.imports.is_empty() {
        let _ = writeln!(out, "\n# import");
        for import in &manifest.imports {
            let mut line = format!("{}\t{}\t{}", import.package, import.version, import.repo);
            if !import.options.is_empty() {
                if import.repo.is_empty() {
                    line = format!("{}\t{}", import.package, import.version);
                }
                line.push('\t');
                line.push_str(&format_options(import.options));
            }
            let _ = writeln!(out, "{}", line.trim());
        }
    }

    if !manifest.packages.is_empty() {
        let _ = writeln!(out, "\n# packages");
        for package in &manifest.packages {
            let _ = writeln!(out, "package={package}");
        }
    }

    if !manifest.excludes.is_empty() {
        let _ = writeln!(out, "\n# exclude");
        for pattern in &manifest.excludes {
            let _ = writeln!(out, "-{}", pattern.trim());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_imports_and_excludes() {
        let m = parse(
            "# comment line\n\
             \n\
             github.com/me/project   # trailing comment\n\
             github.com/pkg/errors v0.8.0\n\
             golang.org/x/net a1b2c3d https://github.com/golang/net.git\n\
             -golang.org/x/net/html/testdata\n",
        );

        assert_eq!(m.root_package, "github.com/me/project");
        assert_eq!(m.imports.len(), 2);
        assert_eq!(m.imports[0].package, "github.com/pkg/errors");
        assert_eq!(m.imports[0].version, "v0.8.0");
        assert!(m.imports[0].repo.is_empty());
        assert_eq!(m.imports[1].repo, "https://github.com/golang/net.git");
        assert_eq!(m.excludes, ["golang.org/x/net/html/testdata"]);
    }

    #[test]
    fn test_only_first_single_field_line_is_root() {
        let m = parse("example.com/one\nexample.com/two\n");
        assert_eq!(m.root_package, "example.com/one");
        assert_eq!(m.imports.len(), 1);
        assert_eq!(m.imports[0].package, "example.com/two");
        assert!(m.imports[0].version.is_empty());
    }

    #[test]
    fn test_package_lines_are_not_pins() {
        let m = parse("example.com/app\npackage=github.com/x/y/staging\ngithub.com/a/a v1\n");
        assert_eq!(m.packages, ["github.com/x/y/staging"]);
        assert_eq!(m.imports.len(), 1);
        assert_eq!(m.imports[0].package, "github.com/a/a");

        let written = write(&m);
        assert!(written.contains("\n# packages\npackage=github.com/x/y/staging\n"));
        assert_eq!(parse(&written).packages, m.packages);
    }

    #[test]
    fn test_third_field_options() {
        let m = parse("root\nk8s.io/api v0.20.0 transitive=true,staging=true,other=1\n");
        let api = &m.imports[0];
        assert!(api.repo.is_empty());
        assert!(api.options.transitive);
        assert!(api.options.staging);
    }

    #[test]
    fn test_fourth_field_options_with_repo() {
        let m = parse("root\nk8s.io/api v1 https://example.com/api.git staging=true\n");
        let api = &m.imports[0];
        assert_eq!(api.repo, "https://example.com/api.git");
        assert!(api.options.staging);
        assert!(!api.options.transitive);
    }

    #[test]
    fn test_parse_options_ignores_unknown_and_false() {
        let opts = parse_options("transitive=false,staging=true,bogus=true,noequals");
        assert!(!opts.transitive);
        assert!(opts.staging);
    }

    #[test]
    fn test_write_trims_empty_trailing_fields_and_keeps_options() {
        let mut m = Manifest::new(ManifestFormat::Flat);
        m.root_package = "root".into();
        m.imports.push(Import::new("a").with_version("v1"));
        m.imports.push(
            Import::new("b")
                .with_version("v2")
                .with_options(ImportOptions {
                    transitive: true,
                    staging: false,
                }),
        );

        assert_eq!(
            write(&m),
            "# package\nroot\n\n# import\na\tv1\nb\tv2\ttransitive=true\n"
        );
        let back = parse(&write(&m));
        assert!(back.imports[1].options.transitive);
        assert!(back.imports[1].repo.is_empty());
    }
}
