//! Integration tests for the `trash` binary.

use std::fs;
use std::path::Path;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_trash"));
    cmd.env_remove("RUST_LOG").env_remove("GOPATH");
    cmd
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A project whose vendor directory holds one used and one unused package.
fn fixture(root: &Path) {
    write(
        &root.join("main.go"),
        "package main\n\nimport \"github.com/a/a\"\n\nfunc main() { a.Run() }\n",
    );
    write(
        &root.join("vendor.conf"),
        "example.com/app\ngithub.com/a/a v1.0.0\ngithub.com/b/b v2.0.0\n",
    );
    write(&root.join("vendor/github.com/a/a/a.go"), "package a\n\nfunc Run() {}\n");
    write(
        &root.join("vendor/github.com/a/a/a_test.go"),
        "package a\n\nimport \"testing\"\n",
    );
    write(&root.join("vendor/github.com/a/a/LICENSE"), "MIT\n");
    write(&root.join("vendor/github.com/b/b/b.go"), "package b\n");
}

#[test]
fn test_version_prints_name_and_version() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("trash "), "unexpected output: {stdout}");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_clean_prunes_vendor_dir() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let output = cargo_bin()
        .arg("-C")
        .arg(dir.path())
        .args(["--platform", "any", "clean"])
        .output()
        .expect("Failed to run clean command");

    assert!(
        output.status.success(),
        "clean failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let vendor = dir.path().join("vendor/github.com");
    assert!(vendor.join("a/a/a.go").is_file());
    assert!(vendor.join("a/a/LICENSE").is_file());
    assert!(!vendor.join("a/a/a_test.go").exists());
    assert!(!vendor.join("b").exists());
}

#[test]
fn test_clean_json_output() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let output = cargo_bin()
        .arg("-C")
        .arg(dir.path())
        .args(["--json", "--platform", "any", "clean"])
        .output()
        .expect("Failed to run clean command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");

    assert_eq!(json["ok"], serde_json::json!(true));
    assert!(json["prune"]["passes"].as_u64().unwrap() >= 1);
    let missing = json["prune"]["missing_pins"].as_array().unwrap();
    assert_eq!(missing, &vec![serde_json::json!("github.com/b/b")]);
}

#[test]
fn test_missing_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = cargo_bin()
        .arg("-C")
        .arg(dir.path())
        .args(["--json", "clean"])
        .output()
        .expect("Failed to run clean command");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("no manifest found"), "message: {message}");
}

#[test]
fn test_pin_without_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("vendor.conf"),
        "example.com/app\ngithub.com/a/a\n",
    );

    let output = cargo_bin()
        .arg("-C")
        .arg(dir.path())
        .arg("--json")
        .env("TRASH_CACHE", cache.path())
        .output()
        .expect("Failed to run trash");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], serde_json::json!(false));
    assert_eq!(json["error"]["code"], serde_json::json!("CONFIG_INVALID"));
    assert!(!dir.path().join("vendor").exists());
}
