//! `trash vendor` command implementation.
//!
//! Running `trash` without a subcommand lands here as well.

use super::fail;
use clap::Args;
use miette::Result;
use trash_core::{workflow, Config};

#[derive(Args, Debug, Clone, Default)]
pub struct VendorArgs {
    /// Keep .git directories and skip pruning
    #[arg(short, long)]
    pub keep: bool,

    /// Discover the imports and rewrite the manifest with the versions found
    #[arg(short, long)]
    pub update: bool,

    /// Allow plain http when fetching through the Go toolchain
    #[arg(long)]
    pub insecure: bool,
}

impl VendorArgs {
    /// Combine flags given before and after the `vendor` subcommand.
    pub fn merged(&self, outer: &Self) -> Self {
        Self {
            keep: self.keep || outer.keep,
            update: self.update || outer.update,
            insecure: self.insecure || outer.insecure,
        }
    }
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let _span = tracing::info_span!("vendor", dir = %config.dir.display()).entered();

    if config.update {
        let report = workflow::update(config).map_err(|e| fail(e, json))?;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "ok": true,
                    "update": report,
                })
            );
        } else {
            println!(
                "Wrote {} pins for {} to {}",
                report.pins,
                report.root_package,
                report.manifest.display()
            );
        }
        return Ok(());
    }

    let manifest = workflow::open_manifest(config).map_err(|e| fail(e, json))?;
    let report = workflow::vendor(config, &manifest).map_err(|e| fail(e, json))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "vendor_dir": config.vendor_dir(),
                "vendor": report,
            })
        );
    } else {
        println!(
            "Vendored {} packages for {} ({} files)",
            report.vendored, report.root_package, report.files_copied
        );
        if let Some(prune) = &report.prune {
            println!("Pruned {} entries in {} passes", prune.removed(), prune.passes);
            for package in &prune.missing_pins {
                println!("  unused pin: {package}");
            }
        }
    }

    Ok(())
}
