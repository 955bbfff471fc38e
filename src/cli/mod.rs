//! Command-line interface definitions for the `nimbus` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `nimbus` binary.
#[derive(Debug, Parser)]
#[command(
    name = "nimbus",
    about = "Create and stop compute instances on an OpenStack cloud",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Validate the connection to the configured cloud.
    #[command(name = "check", about = "Validate the connection to the configured cloud")]
    Check(EndpointArgs),
    /// Create one or more instances.
    #[command(name = "create", about = "Create one or more instances")]
    Create(CreateCommand),
    /// Release an instance's floating IP and delete its server.
    #[command(name = "stop", about = "Release an instance's floating IP and delete its server")]
    Stop(StopCommand),
}

/// Endpoint parameters shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct EndpointArgs {
    /// Endpoint parameter as `KEY=VALUE`, repeatable.
    ///
    /// Recognised keys are `OSCloud`, `ImageID`, `ImageName`, `FlavorName`,
    /// `KeyName`, `NetworkName`, `PublicNetwork` and `CEType`. Any other key
    /// is kept and can be referenced from user-data templates as `${KEY}`.
    /// `OSCloud` defaults to the cloud named in the configuration.
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub(crate) params: Vec<String>,
    /// Maximum seconds to wait for a server to become active (or to
    /// disappear when deletion is confirmed).
    #[arg(long, value_name = "SECONDS")]
    pub(crate) wait_timeout: Option<u64>,
}

/// Arguments for the `nimbus create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Shared endpoint options.
    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
    /// Number of instances to create, one after another. Creation stops at
    /// the first failure.
    #[arg(long, short = 'n', default_value_t = 1, value_name = "N")]
    pub(crate) count: usize,
    /// User-data template given inline. `${KEY}` placeholders are replaced
    /// with endpoint parameters.
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "user_data_file")]
    pub(crate) user_data: Option<String>,
    /// User-data template read from a local file.
    #[arg(long, value_name = "PATH", conflicts_with = "user_data")]
    pub(crate) user_data_file: Option<String>,
    /// Prefix of created server names.
    #[arg(long, value_name = "PREFIX")]
    pub(crate) name_prefix: Option<String>,
}

/// Arguments for the `nimbus stop` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct StopCommand {
    /// Shared endpoint options.
    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
    /// Provider server id of the instance.
    #[arg(value_name = "NODE_ID")]
    pub(crate) node_id: String,
    /// Floating IP to release before the server is deleted.
    #[arg(long, value_name = "ADDRESS")]
    pub(crate) public_ip: Option<String>,
    /// Wait until the server is gone before returning.
    #[arg(long)]
    pub(crate) confirm_deletion: bool,
}
