//! Unit tests for the `nimbus` CLI binary implementation.

use super::*;
use nimbus::parameters::IMAGE_NAME;
use nimbus::test_support::{FakeConnector, FakeProvider, ProviderCall};
use nimbus::{BatchFailure, InstanceId};
use rstest::{fixture, rstest};

#[fixture]
fn provider() -> FakeProvider {
    FakeProvider::stocked()
}

fn endpoint_args(params: &[&str]) -> EndpointArgs {
    EndpointArgs {
        params: params.iter().map(|param| (*param).to_owned()).collect(),
        wait_timeout: Some(1),
    }
}

#[rstest]
fn defaults_cloud_to_configured_profile() {
    let parameters = endpoint_parameters(&[String::from("ImageName=ubuntu-24.04")], "lab")
        .expect("parameters should parse");
    assert_eq!(parameters.text(OS_CLOUD).as_deref(), Some("lab"));
    assert_eq!(parameters.text(IMAGE_NAME).as_deref(), Some("ubuntu-24.04"));
}

#[rstest]
fn explicit_cloud_wins_over_default() {
    let parameters = endpoint_parameters(&[String::from("OSCloud=other")], "lab")
        .expect("parameters should parse");
    assert_eq!(parameters.text(OS_CLOUD).as_deref(), Some("other"));
}

#[rstest]
#[case("FlavorName")]
#[case("=m1.small")]
fn rejects_malformed_assignments(#[case] raw: &str) {
    let err = endpoint_parameters(&[raw.to_owned()], "lab").expect_err("assignment should fail");
    assert!(matches!(err, CliError::Parameter(_)), "unexpected error: {err}");
}

#[rstest]
fn wait_timeout_flag_overrides_default() {
    let args = endpoint_args(&[]);
    assert_eq!(settings(&args).wait_timeout, Duration::from_secs(1));
    let unset = EndpointArgs {
        params: Vec::new(),
        wait_timeout: None,
    };
    assert_eq!(settings(&unset), EndpointSettings::default());
}

#[rstest]
fn create_report_includes_failure() {
    let mut outcome = BatchOutcome {
        requested: 2,
        ..BatchOutcome::default()
    };
    outcome.failure = Some(BatchFailure {
        attempt: 1,
        instance_id: InstanceId::from("abcd1234"),
        error: EndpointError::NotConnected,
    });
    let json = serde_json::to_value(CreateReport::from(&outcome)).expect("report should serialise");
    assert_eq!(json["requested"], 2);
    assert_eq!(json["failure"]["attempt"], 1);
    assert_eq!(json["failure"]["instance_id"], "abcd1234");
    assert_eq!(
        json["failure"]["error"],
        "endpoint has no valid provider connection"
    );
}

#[rstest]
#[tokio::test]
async fn stop_deletes_server_and_releases_ip(provider: FakeProvider) {
    provider.add_server("srv-1", "nimbus_one");
    provider.add_floating_ip("fip-1", "198.51.100.3", None);
    let command = StopCommand {
        endpoint: endpoint_args(&[]),
        node_id: String::from("srv-1"),
        public_ip: Some(String::from("198.51.100.3")),
        confirm_deletion: true,
    };

    execute(Cli::Stop(command), &FakeConnector::new(provider.clone()), "lab")
        .await
        .expect("stop should succeed");

    assert!(provider.servers().is_empty());
    assert_eq!(provider.floating_ip_count(), 0);
}

#[rstest]
#[tokio::test]
async fn create_runs_requested_batch(provider: FakeProvider) {
    let command = CreateCommand {
        endpoint: endpoint_args(&["ImageName=ubuntu-24.04", "FlavorName=m1.small"]),
        count: 2,
        user_data: Some(String::from("#!/bin/sh\necho ${VMUUID}\n")),
        user_data_file: None,
        name_prefix: Some(String::from("batch")),
    };

    execute(Cli::Create(command), &FakeConnector::new(provider.clone()), "lab")
        .await
        .expect("create should succeed");

    let servers = provider.servers();
    assert_eq!(servers.len(), 2);
    assert!(servers.iter().all(|server| server.name.starts_with("batch_")));
}

#[rstest]
#[tokio::test]
async fn create_rejects_conflicting_user_data_sources(provider: FakeProvider) {
    let command = CreateCommand {
        endpoint: endpoint_args(&[]),
        count: 1,
        user_data: Some(String::from("#!/bin/sh")),
        user_data_file: Some(String::from("/tmp/user-data.sh")),
        name_prefix: None,
    };
    let err = execute(Cli::Create(command), &FakeConnector::new(provider), "lab")
        .await
        .expect_err("conflicting sources should fail");
    assert!(matches!(err, CliError::UserData(_)), "unexpected error: {err}");
}

#[rstest]
#[tokio::test]
async fn check_reports_connection_failures(provider: FakeProvider) {
    let connector = FakeConnector::new(provider).refusing("token expired");
    let err = execute(Cli::Check(endpoint_args(&[])), &connector, "lab")
        .await
        .expect_err("check should fail");
    assert!(
        matches!(
            err,
            CliError::Endpoint(EndpointError::Connection(ref message))
                if message.contains("token expired")
        ),
        "unexpected error: {err}"
    );
    assert_eq!(connector.profiles(), vec![String::from("lab")]);
}

#[rstest]
#[tokio::test]
async fn create_without_flavor_reports_failure_in_batch(provider: FakeProvider) {
    let command = CreateCommand {
        endpoint: endpoint_args(&["ImageName=ubuntu-24.04"]),
        count: 3,
        user_data: None,
        user_data_file: None,
        name_prefix: None,
    };
    execute(Cli::Create(command), &FakeConnector::new(provider.clone()), "lab")
        .await
        .expect("batch call should still succeed");
    assert!(provider.servers().is_empty());
    assert_eq!(
        provider.count_calls(|call| matches!(call, ProviderCall::FindFlavor(_))),
        0
    );
}

#[rstest]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    write_error(&mut buf, &CliError::Config(String::from("missing OS_AUTH_URL")));
    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(rendered, "configuration error: missing OS_AUTH_URL\n");
}
