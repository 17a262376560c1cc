//! Golden tests for verifying JSON output format stability
//!
//! Run with: `cargo test --features golden`

#![cfg(feature = "golden")]

use std::process::{Command, Output};

use tempfile::TempDir;

/// Run stashcp with an isolated config directory and telemetry disabled
fn run(args: &[&str]) -> (Output, TempDir) {
    let config_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        config_dir.path().join("config.toml"),
        "[telemetry]\nenabled = false\n",
    )
    .expect("Failed to write config");

    let output = Command::new(env!("CARGO_BIN_EXE_stashcp"))
        .args(args)
        .env("STASHCP_CONFIG_DIR", config_dir.path())
        .env_remove("RUST_LOG")
        .current_dir(config_dir.path())
        .output()
        .expect("Failed to execute stashcp");
    (output, config_dir)
}

#[test]
fn test_unknown_scheme_json() {
    let (output, _dir) = run(&["--json", "ftp://host/file", "out"]);

    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    // Timing varies between runs
    let elapsed = json["transfers"][0]
        .as_object_mut()
        .and_then(|t| t.remove("elapsed_secs"));
    assert!(elapsed.is_some_and(|e| e.is_f64()));

    insta::assert_json_snapshot!(json, @r#"
    {
      "errors": [],
      "transfers": [
        {
          "destination": "out",
          "error": "Do not understand scheme 'ftp' in locator 'ftp://host/file'",
          "size_bytes": 0,
          "size_human": "0 B",
          "source": "ftp://host/file",
          "status": "failed",
          "writeback": false
        }
      ]
    }
    "#);
}

#[test]
fn test_missing_destination_is_usage_error() {
    let (output, _dir) = run(&["osdf:///ospool/a"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_completions() {
    let (output, _dir) = run(&["--completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("stashcp"));
}
