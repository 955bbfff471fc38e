//! Binary entry point for the Nimbus CLI.

mod cli;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use nimbus::parameters::OS_CLOUD;
use nimbus::{
    BatchOutcome, Connector, Endpoint, EndpointError, EndpointParameters, EndpointSettings,
    InstanceDescriptor, OpenStackConfig, OpenStackConnector, ParameterAssignment, TemplateUserData,
};

use cli::{Cli, CreateCommand, EndpointArgs, StopCommand};

const LOG_ENV: &str = "NIMBUS_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid parameter: {0}")]
    Parameter(String),
    #[error("user-data error: {0}")]
    UserData(String),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    cloud: &'a str,
    valid: bool,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    attempt: usize,
    instance_id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct CreateReport<'a> {
    requested: usize,
    created: &'a BTreeMap<String, InstanceDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReport>,
}

impl<'a> From<&'a BatchOutcome> for CreateReport<'a> {
    fn from(outcome: &'a BatchOutcome) -> Self {
        Self {
            requested: outcome.requested,
            created: &outcome.created,
            failure: outcome.failure.as_ref().map(|failure| FailureReport {
                attempt: failure.attempt,
                instance_id: failure.instance_id.to_string(),
                error: failure.error.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct StopReport<'a> {
    stopped: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    released_ip: Option<&'a str>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    #[cfg(feature = "test-backdoors")]
    if let Some(connector) = backdoor::fake_connector_from_env() {
        return execute(cli, &connector, backdoor::FAKE_CLOUD).await;
    }

    let config =
        OpenStackConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let cloud = config.cloud.clone();
    let connector = OpenStackConnector::from_config(config);
    execute(cli, &connector, &cloud).await
}

async fn execute<C: Connector>(
    cli: Cli,
    connector: &C,
    default_cloud: &str,
) -> Result<(), CliError> {
    match cli {
        Cli::Check(args) => run_check(&args, connector, default_cloud).await,
        Cli::Create(command) => run_create(command, connector, default_cloud).await,
        Cli::Stop(command) => run_stop(&command, connector, default_cloud).await,
    }
}

async fn run_check<C: Connector>(
    args: &EndpointArgs,
    connector: &C,
    default_cloud: &str,
) -> Result<(), CliError> {
    let parameters = endpoint_parameters(&args.params, default_cloud)?;
    let cloud = parameters
        .text(OS_CLOUD)
        .unwrap_or_else(|| default_cloud.to_owned());
    let endpoint: Endpoint<C::Provider, TemplateUserData> = Endpoint::with_settings(
        parameters,
        connector,
        TemplateUserData::default(),
        settings(args),
    )
    .await;
    ensure_valid(&endpoint)?;
    write_json(&CheckReport {
        cloud: &cloud,
        valid: true,
    })
}

async fn run_create<C: Connector>(
    command: CreateCommand,
    connector: &C,
    default_cloud: &str,
) -> Result<(), CliError> {
    let parameters = endpoint_parameters(&command.endpoint.params, default_cloud)?;
    let user_data = TemplateUserData::from_sources(
        command.user_data.as_deref(),
        command.user_data_file.as_deref(),
    )
    .map_err(|err| CliError::UserData(err.to_string()))?;
    let mut endpoint_settings = settings(&command.endpoint);
    if let Some(prefix) = command.name_prefix {
        endpoint_settings = endpoint_settings.with_server_name_prefix(prefix);
    }

    let mut endpoint =
        Endpoint::with_settings(parameters, connector, user_data, endpoint_settings).await;
    ensure_valid(&endpoint)?;
    let outcome = endpoint.create_instances(command.count).await?;
    write_json(&CreateReport::from(&outcome))
}

async fn run_stop<C: Connector>(
    command: &StopCommand,
    connector: &C,
    default_cloud: &str,
) -> Result<(), CliError> {
    let parameters = endpoint_parameters(&command.endpoint.params, default_cloud)?;
    let endpoint_settings =
        settings(&command.endpoint).with_confirm_deletion(command.confirm_deletion);
    let endpoint: Endpoint<C::Provider, TemplateUserData> = Endpoint::with_settings(
        parameters,
        connector,
        TemplateUserData::default(),
        endpoint_settings,
    )
    .await;
    ensure_valid(&endpoint)?;
    let public_ip = command.public_ip.as_deref();
    endpoint.stop_vm(&command.node_id, public_ip).await?;
    write_json(&StopReport {
        stopped: &command.node_id,
        released_ip: public_ip,
    })
}

/// Parses `KEY=VALUE` assignments and defaults `OSCloud` to the configured
/// cloud. Later assignments of the same key win.
fn endpoint_parameters(
    raw: &[String],
    default_cloud: &str,
) -> Result<EndpointParameters, CliError> {
    let assignments = raw
        .iter()
        .map(|item| item.parse::<ParameterAssignment>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CliError::Parameter(err.to_string()))?;
    let mut parameters: EndpointParameters = assignments.into_iter().collect();
    if parameters.text(OS_CLOUD).is_none() {
        parameters.set(OS_CLOUD, default_cloud);
    }
    Ok(parameters)
}

fn settings(args: &EndpointArgs) -> EndpointSettings {
    let defaults = EndpointSettings::default();
    match args.wait_timeout {
        Some(seconds) => defaults.with_wait_timeout(Duration::from_secs(seconds)),
        None => defaults,
    }
}

fn ensure_valid<P, U>(endpoint: &Endpoint<P, U>) -> Result<(), CliError> {
    match endpoint.connection_error() {
        Some(err) => Err(CliError::Endpoint(err.clone())),
        None if endpoint.is_valid() => Ok(()),
        None => Err(CliError::Endpoint(EndpointError::NotConnected)),
    }
}

fn write_json(report: &impl Serialize) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(report).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(io::stdout(), "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(feature = "test-backdoors")]
mod backdoor {
    //! In-memory cloud for end-to-end CLI tests.

    use std::env;

    use nimbus::test_support::{FakeConnector, FakeProvider};

    pub(super) const FAKE_CLOUD: &str = "fake";
    const FAKE_CLOUD_ENV: &str = "NIMBUS_FAKE_CLOUD";

    /// Builds a stocked fake cloud when `NIMBUS_FAKE_CLOUD` is set.
    ///
    /// The value is a comma separated list of directives: `refuse`,
    /// `fail-create-on=N`, `fail-delete` and `stall`. The cloud always holds
    /// server `srv-seeded` and floating IP `198.51.100.10`.
    pub(super) fn fake_connector_from_env() -> Option<FakeConnector> {
        let directives = env::var(FAKE_CLOUD_ENV).ok()?;
        let provider = FakeProvider::stocked();
        provider.add_server("srv-seeded", "nimbus_seeded");
        provider.add_floating_ip("fip-seeded", "198.51.100.10", None);

        let mut refuse = false;
        for directive in directives.split(',').map(str::trim) {
            match directive {
                "refuse" => refuse = true,
                "fail-delete" => provider.fail_delete_server(),
                "stall" => provider.stall_wait(),
                other => {
                    if let Some(attempt) = other
                        .strip_prefix("fail-create-on=")
                        .and_then(|value| value.parse().ok())
                    {
                        provider.fail_create_server_on(attempt);
                    }
                }
            }
        }

        let connector = FakeConnector::new(provider);
        Some(if refuse {
            connector.refusing("fake cloud refused the connection")
        } else {
            connector
        })
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
