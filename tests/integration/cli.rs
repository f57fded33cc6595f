//! The `rtpm` binary as users run it.

use crate::common::{CURRENT_VERSION, MockRelease, TestEnvironment};
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    let env = TestEnvironment::new();
    env.rtpm_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("service"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version_flag() {
    let env = TestEnvironment::new();
    env.rtpm_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(CURRENT_VERSION));
}

#[test]
fn test_status_json_up_to_date() {
    let release = MockRelease::publish_blocking(CURRENT_VERSION, b"rtpm");
    let env = TestEnvironment::new();

    let output = env.rtpm_command_for(&release).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["version"], CURRENT_VERSION);
    assert_eq!(report["channel"], "release");
    assert_eq!(report["platform"], rtpm_cli::utils::platform_id());
    assert!(report["latest_version"].is_null());
    assert!(report["check_error"].is_null());
    assert!(report["update_in_progress"].is_boolean());
}

#[test]
fn test_status_json_reports_available_update() {
    let release = MockRelease::publish_blocking("99.0.0", b"rtpm");
    let env = TestEnvironment::new();

    let output = env.rtpm_command_for(&release).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["latest_version"], "99.0.0");
}

#[test]
fn test_status_survives_unreachable_server() {
    let env = TestEnvironment::new();

    let output = env.rtpm_command().args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["latest_version"].is_null());
    assert!(report["check_error"].is_string());
}

#[test]
fn test_status_honors_disabled_auto_update_config() {
    let release = MockRelease::publish_blocking(CURRENT_VERSION, b"rtpm");
    let env = TestEnvironment::new();
    env.write_config("[update]\nauto_update = false\n");

    env.rtpm_command_for(&release)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("auto-update:  disabled"));
}

#[test]
fn test_update_check_reports_available_version() {
    let release = MockRelease::publish_blocking("99.0.0", b"rtpm");
    let env = TestEnvironment::new();

    env.rtpm_command_for(&release)
        .args(["update", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Update available: {CURRENT_VERSION} -> 99.0.0"
        )));
    // Only the info endpoint is consulted
    assert!(!release.archive.as_ref().unwrap().matched());
}

#[test]
fn test_update_check_when_current() {
    let release = MockRelease::publish_blocking(CURRENT_VERSION, b"rtpm");
    let env = TestEnvironment::new();

    env.rtpm_command_for(&release)
        .args(["update", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("You are on the latest version"));
}

#[test]
fn test_update_check_network_failure() {
    let env = TestEnvironment::new();

    env.rtpm_command()
        .args(["update", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Check your internet connection"));
}

#[test]
fn test_invalid_global_config_is_reported() {
    let env = TestEnvironment::new();
    env.write_config("[update\nauto_update = ");

    env.rtpm_command()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse global config"));
}

#[test]
fn test_project_pin_skips_auto_update() {
    let release = MockRelease::publish_blocking("99.0.0", b"rtpm");
    let env = TestEnvironment::new();
    env.write_project("[tool]\nversion = \"1.0.0\"\n");

    env.rtpm_command_for(&release)
        .env_remove("RTPM_TESTING")
        .args(["--verbose", "status"])
        .assert()
        .success()
        .stderr(predicate::str::contains("project pins version 1.0.0"));
}

#[test]
fn test_in_place_conflicts_with_legacy() {
    let env = TestEnvironment::new();
    env.rtpm_command()
        .args(["update", "--in-place", "--legacy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
