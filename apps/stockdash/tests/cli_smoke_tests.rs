#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the stockdash binary.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Runs the binary with a clean `STOCKDASH__*` environment plus `env`.
fn run_stockdash(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stockdash"));
    for (key, _) in std::env::vars() {
        if key.starts_with("STOCKDASH__") {
            cmd.env_remove(key);
        }
    }
    cmd.env_remove("RUST_LOG")
        .env("STOCKDASH__AVATAR__WARM_UP__ENABLED", "false")
        .envs(env.iter().copied())
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute stockdash")
}

fn avatar(store: &Path, args: &[&str]) -> Output {
    let mut full = vec!["avatar", "--store", store.to_str().unwrap()];
    full.extend_from_slice(args);
    run_stockdash(&full, &[])
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

#[test]
fn test_cli_help_command() {
    let output = run_stockdash(&["--help"], &[]);
    assert!(output.status.success(), "Help command should succeed");

    let out = stdout(&output);
    assert!(out.contains("Usage:"), "Should contain usage information");
    assert!(out.contains("check-db"));
    assert!(out.contains("health"));
    assert!(out.contains("avatar"));
    assert!(out.contains("--config"));
}

#[test]
fn test_cli_version_command() {
    let output = run_stockdash(&["--version"], &[]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("stockdash"));
}

#[test]
fn test_cli_invalid_command() {
    let output = run_stockdash(&["invalid-command"], &[]);
    assert!(!output.status.success(), "Invalid command should fail");
}

#[test]
fn test_cli_missing_config_file() {
    let output = run_stockdash(&["--config", "/nonexistent/stockdash.yaml", "check-db"], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
}

#[test]
fn test_check_db_without_dsn_fails() {
    let output = run_stockdash(&["check-db"], &[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not configured"), "stderr: {stderr}");
}

#[test]
fn test_check_db_in_memory_sqlite() {
    let output = run_stockdash(&["check-db"], &[("STOCKDASH__DATABASE__DSN", "sqlite::memory:")]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Database connection OK"));
}

#[test]
fn test_health_reports_json() {
    let output = run_stockdash(&["health"], &[("STOCKDASH__DATABASE__DSN", "sqlite::memory:")]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["ok"], true);
    assert_eq!(report["db"]["ok"], true);
    assert!(report["db"]["error"].is_null());
    assert!(report["time"].is_string());
}

#[test]
fn test_health_without_dsn_is_not_ok() {
    let output = run_stockdash(&["health"], &[]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["ok"], false);
    assert!(report["db"]["error"].as_str().unwrap().contains("not configured"));
}

#[test]
fn test_avatar_link_then_show() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("prefs.json");

    let output = avatar(&store, &["--id", "u1", "link", "https://x/a.png"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "https://x/a.png");

    let output = avatar(&store, &["--id", "u1", "show"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["key"], "nt/avatar-pref/u1");
    assert_eq!(report["preference"]["mode"], "url");
    assert_eq!(report["url"], "https://x/a.png");

    let output = avatar(&store, &["--id", "u1", "reset"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("/identicon/svg?seed=u1"));
}

#[test]
fn test_avatar_pick_and_next_style() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("prefs.json");

    let output = avatar(&store, &["--id", "u1", "pick", "3"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("/micah/svg?seed=u1"));

    let output = avatar(&store, &["--id", "u1", "next-style"]);
    assert!(stdout(&output).contains("/identicon/svg?seed=u1"));

    let output = avatar(&store, &["--id", "u1", "pick", "9"]);
    assert!(!output.status.success());
    let output = avatar(&store, &["--id", "u1", "show"]);
    assert!(stdout(&output).contains("identicon"));
}

#[test]
fn test_avatar_upload_stores_data_url() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("prefs.json");
    let image = dir.path().join("me.png");
    std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

    let output = avatar(&store, &["--email", "ann@example.com", "upload", image.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("data:image/png;base64,"));

    let raw = std::fs::read_to_string(&store).unwrap();
    assert!(raw.contains("nt/avatar-pref/ann@example.com"));
    assert!(raw.contains("dataUrl"));
}
