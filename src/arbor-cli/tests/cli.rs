//! Process-level tests for the `arbor` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn arbor() -> Command {
    let mut cmd = Command::cargo_bin("arbor").unwrap();
    let config_home = std::env::temp_dir().join("arbor-cli-tests-no-config");
    cmd.env_remove("RUST_LOG")
        .env_remove("ARBOR_LOG_LEVEL")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn greet_by_name() {
    arbor()
        .args(["greet", "--name=Alice"])
        .assert()
        .success()
        .stdout("Hello, Alice!\n");
}

#[test]
fn greet_default_and_shout() {
    arbor().arg("greet").assert().success().stdout("Hello, World!\n");
    arbor()
        .args(["greet", "--shout", "--name=bob"])
        .assert()
        .success()
        .stdout("HELLO, BOB!\n");
}

#[test]
fn greet_rejects_bad_flag_value() {
    arbor()
        .args(["greet", "--shout=maybe"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains(
            "Invalid flags for command 'greet':\n  --shout: expected a boolean, got 'maybe'",
        ));
}

#[test]
fn unknown_command_suggestion() {
    arbor()
        .args(["usr", "add"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown command: usr"))
        .stderr(predicate::str::contains("Did you mean \"user add\"?"))
        .stdout(predicate::str::contains("USAGE:"));
}

#[test]
fn version_flag() {
    arbor()
        .arg("--version")
        .assert()
        .success()
        .stdout(format!("arbor {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_arguments_prints_help() {
    arbor()
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE:"))
        .stdout(predicate::str::contains("user remove"))
        .stdout(predicate::str::contains("user rm").not());
}

#[test]
fn removing_admin_is_refused() {
    arbor()
        .args(["user", "remove", "admin"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Refusing to remove the admin user"));
}

#[test]
fn remove_through_alias() {
    arbor()
        .args(["user", "rm", "guest"])
        .assert()
        .success()
        .stdout("Removed user 'guest'\n");
}

#[test]
fn lazy_list_command() {
    arbor()
        .args(["user", "list"])
        .assert()
        .success()
        .stdout("admin\nguest\n");

    let output = arbor()
        .args(["--output=json", "user", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let users: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(users, vec!["admin", "guest"]);
}

#[test]
fn add_requires_a_name() {
    arbor()
        .args(["user", "add"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage: arbor user add"));
    arbor()
        .args(["-q", "user", "add", "carol", "--admin"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn config_show_merges_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "region: eu\nretries: 3\n").unwrap();

    let config_arg = format!("--config={}", path.display());
    let output = arbor()
        .env("ARBOR_REGION", "us")
        .args([
            config_arg.as_str(),
            "--output=json",
            "config",
            "show",
            "--profile=dev",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["region"], "us");
    assert_eq!(shown["retries"], 3);
    assert_eq!(shown["profile"], "dev");
    assert_eq!(shown["output"], "json");
}

#[test]
fn passthrough_is_not_interpreted() {
    arbor()
        .args(["greet", "--", "--version"])
        .assert()
        .success()
        .stdout("Hello, World!\n");
}
