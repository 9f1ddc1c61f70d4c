//! CLI integration tests for the chatroom command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Config files are resolved and validated
//! - Simulations report eviction counts

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the chatroom binary, isolated from the real user config.
fn chatroom(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chatroom").unwrap();
    cmd.env("CHATROOM_CONFIG_DIR", config_dir.path())
        .env_remove("CHATROOM_CONFIG")
        .current_dir(config_dir.path());
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    chatroom(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("simulate"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    chatroom(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chatroom"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults_json() {
    let dir = TempDir::new().unwrap();
    let output = chatroom(&dir)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["session"]["ttl_secs"], 86_400);
    assert_eq!(value["session"]["sweep_enabled"], false);
    assert_eq!(value["sources"].as_array().unwrap().len(), 0);
}

#[test]
fn test_config_show_reads_project_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("chatroom.toml"), "[session]\nttl_secs = 900\n").unwrap();

    chatroom(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ttl: 900s"));
}

#[test]
fn test_config_show_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[session]\nid_bytes = 2\n").unwrap();

    chatroom(&dir)
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.id_bytes"));
}

#[test]
fn test_config_init_local_then_refuses_overwrite() {
    let dir = TempDir::new().unwrap();

    chatroom(&dir)
        .args(["config", "init", "--local"])
        .assert()
        .success();
    let written = fs::read_to_string(dir.path().join("chatroom.toml")).unwrap();
    assert!(written.contains("[session]"));

    chatroom(&dir)
        .args(["config", "init", "--local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulate Tests
// ─────────────────────────────────────────────────────────────────────────────

fn simulate_json(dir: &TempDir, extra: &[&str]) -> serde_json::Value {
    let output = chatroom(dir)
        .args(["--json", "simulate"])
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn test_simulate_lazy_eviction() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &[
            "--users",
            "3",
            "--sessions-per-user",
            "4",
            "--ttl-secs",
            "10",
            "--spread-secs",
            "10",
            "--advance-secs",
            "25",
        ],
    );

    // TTLs 10, 20, 30, 40 per user: the first two lapse.
    assert_eq!(report["issued"], 12);
    assert_eq!(report["evicted"], 6);
    assert_eq!(report["remaining"], 6);
    assert_eq!(report["valid"], 6);
}

#[test]
fn test_simulate_sweep_mode() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &[
            "--users",
            "2",
            "--sessions-per-user",
            "3",
            "--ttl-secs",
            "5",
            "--advance-secs",
            "5",
            "--mode",
            "sweep",
        ],
    );

    assert_eq!(report["mode"], "sweep");
    assert_eq!(report["evicted"], 6);
    assert_eq!(report["remaining"], 0);
}

#[test]
fn test_simulate_background_mode() {
    let dir = TempDir::new().unwrap();
    let report = simulate_json(
        &dir,
        &[
            "--users",
            "2",
            "--sessions-per-user",
            "2",
            "--ttl-secs",
            "1",
            "--advance-secs",
            "2",
            "--mode",
            "background",
            "--sweep-interval-ms",
            "10",
        ],
    );

    assert_eq!(report["remaining"], 0);
    assert_eq!(report["valid"], 0);
}

#[test]
fn test_simulate_rejects_zero_users() {
    let dir = TempDir::new().unwrap();
    chatroom(&dir)
        .args(["simulate", "--users", "0"])
        .assert()
        .failure();
}

#[test]
fn test_simulate_rejects_advance_beyond_time_range() {
    let dir = TempDir::new().unwrap();
    chatroom(&dir)
        .args([
            "simulate",
            "--users",
            "1",
            "--sessions-per-user",
            "1",
            "--advance-secs",
            "10000000000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("representable time range"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_simulate_rejects_advance_out_of_duration_range() {
    let dir = TempDir::new().unwrap();
    chatroom(&dir)
        .args([
            "simulate",
            "--users",
            "1",
            "--sessions-per-user",
            "1",
            "--advance-secs",
            "9223372036854775807",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--advance-secs"))
        .stderr(predicate::str::contains("panicked").not());
}
