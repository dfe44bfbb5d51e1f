//! Integration tests for the CLI surface: help, version, and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

pub fn tplcheck() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tplcheck"));
    cmd.env("NO_COLOR", "1")
        .env_remove("GITHUB_USER")
        .env_remove("GITHUB_PASSWORD")
        .env_remove("TPLCHECK_CONFIG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    tplcheck()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_help_lists_commands() {
    tplcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    tplcheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tplcheck"));
}

#[test]
fn test_version_command_shows_version() {
    tplcheck()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tplcheck 0.1.0"));
}

#[test]
fn test_run_help_documents_credential_env_vars() {
    tplcheck()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GITHUB_USER"))
        .stdout(predicate::str::contains("GITHUB_PASSWORD"))
        .stdout(predicate::str::contains("--work-dir"));
}

#[test]
fn test_run_without_credentials_is_usage_error() {
    tplcheck()
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--hosting-user"));
}

#[test]
fn test_run_secret_value_is_not_echoed_in_help() {
    tplcheck()
        .env("GITHUB_PASSWORD", "hunter2")
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_run_with_invalid_config_fails_before_provisioning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "health:\n  interval_secs: 0\n").expect("write");

    tplcheck()
        .arg("--config")
        .arg(&config)
        .args(["run", "--hosting-user", "u", "--hosting-secret", "s"])
        .arg("--work-dir")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("health.interval_secs"));

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .flatten()
        .map(|e| e.file_name())
        .collect();
    assert_eq!(entries, ["config.yaml"], "nothing created in the work dir");
}
