#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

#[test]
fn test_help_lists_subcommands() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("channels"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_init_writes_default_config() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.args(["--dir", dir.path().to_str().unwrap(), "init"])
        .assert()
        .success();

    // Assert
    let content = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(content.contains("[scheduler]"));
    assert!(content.contains("refresh_interval_secs = 600"));
}

#[test]
fn test_init_keeps_existing_config() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[account]\nusername = \"keep@example.com\"\n").unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.args(["--dir", dir.path().to_str().unwrap(), "init"])
        .assert()
        .success();

    // Assert
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("keep@example.com"));
}

#[test]
fn test_channels_without_username_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.args(["--dir", dir.path().to_str().unwrap(), "channels"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("account.username is not set"));
}

#[test]
fn test_login_without_password_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[account]\nusername = \"user@example.com\"\n",
    )
    .unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.env_remove("PVRLINK_PASSWORD")
        .args(["--dir", dir.path().to_str().unwrap(), "login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PVRLINK_PASSWORD"));
}

#[test]
fn test_epg_rejects_non_positive_hours() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.args(["epg", "--channel", "303", "--hours", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hours must be positive"));
}

#[test]
fn test_epg_missing_channel() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.arg("epg")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--channel"));
}

#[test]
fn test_stream_help() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("pvrlink");
    cmd.args(["stream", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"));
}
