use assert_cmd::Command;
use predicates::prelude::*;

const INPUT_VARS: &[&str] = &[
    "work_dir",
    "gem_file_path",
    "app_path",
    "additional_options",
    "simulator_device",
    "simulator_os_version",
    "calabash_cucumber_version",
    "RUST_LOG",
    "CALABASH_STEP_LOG_DIR",
];

/// The step binary with none of its inputs inherited from the test process.
fn step_cmd() -> Command {
    let mut cmd = Command::cargo_bin("calabash-step").unwrap();
    for var in INPUT_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_exits_zero() {
    step_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("calabash-step"))
        .stdout(predicate::str::contains("--simulator-device"));
}

#[test]
fn test_missing_work_dir_fails() {
    step_cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no work_dir parameter specified"));
}

#[test]
fn test_nonexistent_work_dir_fails() {
    step_cmd()
        .env("work_dir", "/path/that/does/not/exist")
        .env("simulator_device", "iPhone 15")
        .env("simulator_os_version", "latest")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("work_dir directory not exists"));
}

#[test]
fn test_missing_simulator_device_fails() {
    let work = tempfile::tempdir().unwrap();
    step_cmd()
        .env("work_dir", work.path())
        .env("simulator_os_version", "latest")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no simulator_device parameter specified"));
}

#[test]
fn test_flags_override_environment() {
    let work = tempfile::tempdir().unwrap();
    step_cmd()
        .env("work_dir", "/path/that/does/not/exist")
        .args(["--work-dir", work.path().to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no simulator_device parameter specified"));
}

#[test]
fn test_unbalanced_options_fail() {
    let work = tempfile::tempdir().unwrap();
    step_cmd()
        .env("work_dir", work.path())
        .env("simulator_device", "iPhone 15")
        .env("simulator_os_version", "latest")
        .env("additional_options", "--tags 'smoke")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to split additional options"));
}

#[test]
fn test_log_dir_mirrors_output() {
    let logs = tempfile::tempdir().unwrap();
    step_cmd()
        .env("CALABASH_STEP_LOG_DIR", logs.path())
        .assert()
        .code(1);

    let log = std::fs::read_to_string(logs.path().join("calabash-step.log")).unwrap();
    assert!(log.contains("no work_dir parameter specified"));
}

#[test]
fn test_unknown_subcommand() {
    step_cmd()
        .arg("totally-fake-command")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_log_dir_that_cannot_be_created_warns() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, "").unwrap();

    step_cmd()
        .env("CALABASH_STEP_LOG_DIR", file.join("logs"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot create log dir"))
        .stderr(predicate::str::contains("no work_dir parameter specified"));
}

#[test]
fn test_list_simulators_subcommand_parses() {
    step_cmd()
        .args(["list-simulators", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("List simulator devices grouped by OS runtime"));
}

#[cfg(unix)]
#[test]
fn test_list_simulators_prints_registry() {
    use std::os::unix::fs::PermissionsExt;

    let bin = tempfile::tempdir().unwrap();
    let xcrun = bin.path().join("xcrun");
    std::fs::write(
        &xcrun,
        r#"#!/bin/sh
exec /bin/cat <<'JSON'
{
  "devices": {
    "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
      {"udid": "B2C3D4E5-F6A7-8901-BCDE-F12345678901", "name": "iPhone 14",
       "state": "Booted", "isAvailable": true}
    ],
    "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
      {"udid": "C3D4E5F6-A7B8-9012-CDEF-123456789012", "name": "iPhone 14",
       "state": "Shutdown", "isAvailable": true}
    ]
  }
}
JSON
"#,
    )
    .unwrap();
    std::fs::set_permissions(&xcrun, std::fs::Permissions::from_mode(0o755)).unwrap();

    step_cmd()
        .env("PATH", bin.path())
        .arg("list-simulators")
        .assert()
        .success()
        .stdout(
            "-- iOS 16.4 --\n\
             C3D4E5F6-A7B8-9012-CDEF-123456789012 -- iPhone 14 (Shutdown)\n\
             -- iOS 17.0 --\n\
             B2C3D4E5-F6A7-8901-BCDE-F12345678901 -- iPhone 14 (Booted)\n",
        );
}

#[test]
fn test_list_simulators_without_xcrun_fails() {
    let empty = tempfile::tempdir().unwrap();
    step_cmd()
        .env("PATH", empty.path())
        .arg("list-simulators")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to list simulators"));
}
