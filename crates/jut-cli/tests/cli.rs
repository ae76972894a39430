//! End-to-end tests of the `jut` binary that need no network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn jut(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("jut").unwrap();
    cmd.env("JUT_HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("JUT_CLIENT_ID")
        .env_remove("JUT_CLIENT_SECRET");
    cmd
}

fn add(home: &TempDir, username: &str) {
    jut(home)
        .args([
            "config",
            "add",
            "--username",
            username,
            "--app-url",
            "https://app.example.com",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--deployment",
            "prod",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Configuration updated at"));
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    jut(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("jobs")));
}

#[test]
fn empty_store_lists_nothing() {
    let home = TempDir::new().unwrap();
    jut(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No configurations available"));
}

#[test]
fn config_add_then_list() {
    let home = TempDir::new().unwrap();
    add(&home, "alice");
    add(&home, "bob");

    jut(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            " 1: alice@https://app.example.com (default)",
        ))
        .stdout(predicate::str::contains(" 2: bob@https://app.example.com\n"));

    let stored = std::fs::read_to_string(home.path().join("config.toml")).unwrap();
    assert!(stored.contains("[[configuration]]"));
}

#[test]
fn config_default_and_rm() {
    let home = TempDir::new().unwrap();
    add(&home, "alice");
    add(&home, "bob");

    jut(&home)
        .args(["config", "default", "bob@https://app.example.com"])
        .assert()
        .success();
    jut(&home).args(["config", "rm", "1"]).assert().success();

    jut(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").not())
        .stdout(predicate::str::contains(" 1: bob@https://app.example.com (default)"));
}

#[test]
fn rm_of_unknown_configuration_fails() {
    let home = TempDir::new().unwrap();
    jut(&home)
        .args(["config", "rm", "3"])
        .assert()
        .code(255)
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn run_without_configuration_fails() {
    let home = TempDir::new().unwrap();
    jut(&home)
        .args(["run", "emit -limit 1"])
        .assert()
        .code(255)
        .stderr(predicate::str::contains("jut config add"));
}
