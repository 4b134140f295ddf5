use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("courier")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("deliveries"))
        .stdout(predicate::str::contains("track"))
        .stdout(predicate::str::contains("polyline"));
}

#[test]
fn test_resource_help_shows_crud_subcommands() {
    cargo_bin_cmd!("courier")
        .args(["couriers", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_track_help_shows_interval() {
    cargo_bin_cmd!("courier")
        .args(["track", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--interval"))
        .stdout(predicate::str::contains("--ticks"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("courier")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
