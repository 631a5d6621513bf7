//! CLI integration tests for brewsync.
//!
//! These only exercise paths that never spawn `brew` or `npm`: help,
//! `explain`, dry-run installs and error handling around `Brewsync.toml`.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the brewsync binary command, isolated from the user's environment.
fn brewsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("brewsync").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("BREWSYNC_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// A temp dir holding a `Brewsync.toml` with the given contents.
fn project(contents: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Brewsync.toml"), contents).unwrap();
    tmp
}

const DESIRED: &str = r#"taps = ["hashicorp/tap"]
formulae = ["git", "wget"]
casks = ["firefox"]
npm = ["typescript"]
"#;

// ============================================================================
// help / completions
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();

    brewsync(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("explain"))
        .stdout(predicate::str::contains("--message-format"));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();

    brewsync(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_brewsync"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();

    brewsync(&home).arg("frobnicate").assert().failure();
}

// ============================================================================
// brewsync explain
// ============================================================================

#[test]
fn test_explain_not_found() {
    let home = TempDir::new().unwrap();

    brewsync(&home)
        .args(["explain", "Error: No available formula with the name \"nosuchpkg\"."])
        .assert()
        .success()
        .stdout(predicate::str::contains("not-found"))
        .stdout(predicate::str::contains("retryable: no"));
}

#[test]
fn test_explain_reads_stdin() {
    let home = TempDir::new().unwrap();

    brewsync(&home)
        .arg("explain")
        .write_stdin("curl: (7) Failed to connect to github.com port 443: Connection refused\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("connection-refused"))
        .stdout(predicate::str::contains("retryable: yes"));
}

#[test]
fn test_explain_json() {
    let home = TempDir::new().unwrap();

    let output = brewsync(&home)
        .args(["--message-format", "json", "explain", "npm ERR! code ETIMEDOUT"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let line = String::from_utf8(output.stdout).unwrap();
    let event: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(event["reason"], "explain");
    assert_eq!(event["error"]["kind"], "timeout");
    assert_eq!(event["retryable"], true);
}

// ============================================================================
// brewsync install --dry-run
// ============================================================================

#[test]
fn test_install_dry_run_lists_every_package() {
    let home = TempDir::new().unwrap();
    let tmp = project(DESIRED);

    brewsync(&home)
        .args(["install", "--dry-run"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("install tap hashicorp/tap"))
        .stderr(predicate::str::contains("install formula wget"))
        .stderr(predicate::str::contains("install cask firefox"))
        .stderr(predicate::str::contains("install npm typescript"));
}

#[test]
fn test_install_dry_run_json_summary() {
    let home = TempDir::new().unwrap();
    let tmp = project(DESIRED);

    let output = brewsync(&home)
        .args(["install", "--dry-run", "--message-format", "json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let event: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(event["reason"], "install-finished");
    assert_eq!(event["summary"]["dry_run"], true);

    let outcomes = event["summary"]["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 5);
    assert!(outcomes
        .iter()
        .all(|o| o["status"] == "skipped" && o["reason"] == "dry-run"));
}

#[test]
fn test_install_dry_run_finds_file_in_parent() {
    let home = TempDir::new().unwrap();
    let tmp = project("formulae = [\"git\"]\n");
    let nested = tmp.path().join("sub/dir");
    fs::create_dir_all(&nested).unwrap();

    brewsync(&home)
        .args(["install", "--dry-run"])
        .current_dir(&nested)
        .assert()
        .success()
        .stderr(predicate::str::contains("install formula git"));
}

#[test]
fn test_install_dry_run_with_file_env() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("work.toml");
    fs::write(&file, "casks = [\"slack\"]\n").unwrap();

    brewsync(&home)
        .env("BREWSYNC_FILE", &file)
        .args(["install", "--dry-run"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("install cask slack"));
}

#[test]
fn test_quiet_dry_run_prints_nothing() {
    let home = TempDir::new().unwrap();
    let tmp = project(DESIRED);

    brewsync(&home)
        .args(["-q", "install", "--dry-run"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// Brewsync.toml errors
// ============================================================================

#[test]
fn test_missing_desired_file() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();

    brewsync(&home)
        .args(["install", "--file", "nope.toml"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error: failed to read"));
}

#[test]
fn test_unknown_key_is_rejected() {
    let home = TempDir::new().unwrap();
    let tmp = project("formula = [\"git\"]\n");

    brewsync(&home)
        .args(["install", "--dry-run"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"))
        .stderr(predicate::str::contains("unknown field"));
}

#[test]
fn test_error_is_json_in_json_mode() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();

    let output = brewsync(&home)
        .args(["--message-format", "json", "install", "-f", "missing.toml"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let event: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(event["reason"], "error");
    assert!(event["message"]
        .as_str()
        .unwrap()
        .contains("failed to read"));
}
