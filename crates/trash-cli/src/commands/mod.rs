pub mod clean;
pub mod vendor;
pub mod version;

use trash_core::Error;

/// Convert an engine error into a diagnostic, printing the JSON error
/// envelope first when machine-readable output was requested.
pub fn fail(err: Error, json: bool) -> miette::Report {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                }
            })
        );
    }
    miette::miette!("[{}] {}", err.code(), err)
}
