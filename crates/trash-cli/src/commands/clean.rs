//! `trash clean` command implementation.

use super::fail;
use miette::Result;
use trash_core::{workflow, Config};

/// Prune the existing vendor directory against the manifest.
pub fn run(config: &Config, json: bool) -> Result<()> {
    let _span = tracing::info_span!("clean", dir = %config.dir.display()).entered();

    let manifest = workflow::open_manifest(config).map_err(|e| fail(e, json))?;
    let report = workflow::clean(config, &manifest).map_err(|e| fail(e, json))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "vendor_dir": config.vendor_dir(),
                "prune": report,
            })
        );
    } else {
        println!(
            "Pruned {} ({} removed in {} passes)",
            config.vendor_dir().display(),
            report.removed(),
            report.passes
        );
        for package in &report.missing_pins {
            println!("  unused pin: {package}");
        }
    }

    Ok(())
}
