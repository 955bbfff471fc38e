//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_help() {
    let mut cmd = cargo_bin_cmd!("nimbus");
    cmd.assert()
        .failure()
        .stderr(contains("Usage:"))
        .stderr(contains("create"));
}

#[test]
fn stop_requires_node_id() {
    let mut cmd = cargo_bin_cmd!("nimbus");
    cmd.arg("stop");
    cmd.assert().failure().stderr(contains("<NODE_ID>"));
}

#[test]
fn create_rejects_both_user_data_sources() {
    let mut cmd = cargo_bin_cmd!("nimbus");
    cmd.args([
        "create",
        "--user-data",
        "#!/bin/sh",
        "--user-data-file",
        "/tmp/user-data.sh",
    ]);
    cmd.assert().failure().stderr(contains("cannot be used with"));
}

#[test]
fn missing_configuration_is_reported() {
    let mut cmd = cargo_bin_cmd!("nimbus");
    cmd.env_remove("OS_AUTH_URL");
    cmd.env_remove("OS_USERNAME");
    cmd.env_remove("OS_PASSWORD");
    cmd.env_remove("OS_PROJECT_NAME");
    cmd.env("NIMBUS_LOG", "off");
    cmd.arg("check");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("configuration"));
}
