//! Instance lifecycle against a single cloud endpoint.
//!
//! An [`Endpoint`] owns one provider session for its whole lifetime. It is
//! validated once at construction ([`Endpoint::new`]) and then drives
//! instance creation ([`Endpoint::create_instance`],
//! [`Endpoint::create_instances`]) and teardown ([`Endpoint::stop_vm`]).
//! Every provider call is awaited in sequence; no requests are issued
//! concurrently from one endpoint.

mod batch;
mod create;
mod stop;

use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::EndpointError;
use crate::parameters::{EndpointParameters, OS_CLOUD};
use crate::provider::{Connector, Provider};
use crate::user_data::UserDataBuilder;

pub use batch::{BatchFailure, BatchOutcome};
pub use create::CreationStage;

const DEFAULT_SERVER_NAME_PREFIX: &str = "nimbus";
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Tunables for endpoint operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointSettings {
    /// Prefix of server names (`<prefix>_<instance id>`).
    pub server_name_prefix: String,
    /// Upper bound for a server to become active, and for deletion to be
    /// confirmed when `confirm_deletion` is set.
    pub wait_timeout: Duration,
    /// Interval between deletion confirmation polls.
    pub poll_interval: Duration,
    /// Wait until a stopped server disappears from the provider.
    pub confirm_deletion: bool,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            server_name_prefix: DEFAULT_SERVER_NAME_PREFIX.to_owned(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirm_deletion: false,
        }
    }
}

impl EndpointSettings {
    /// Overrides the server name prefix.
    #[must_use]
    pub fn with_server_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.server_name_prefix = prefix.into();
        self
    }

    /// Overrides the wait timeout.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Overrides the deletion poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enables or disables deletion confirmation.
    #[must_use]
    pub const fn with_confirm_deletion(mut self, confirm: bool) -> Self {
        self.confirm_deletion = confirm;
        self
    }
}

/// Cloud endpoint bound to one provider session.
#[derive(Debug)]
pub struct Endpoint<P, U> {
    parameters: EndpointParameters,
    provider: Option<P>,
    user_data: U,
    settings: EndpointSettings,
    connection_error: Option<EndpointError>,
}

impl<P, U> Endpoint<P, U>
where
    P: Provider,
    U: UserDataBuilder,
{
    /// Constructs an endpoint and validates its connection once.
    ///
    /// Construction never fails: a connection problem is logged and leaves
    /// the endpoint invalid (see [`Endpoint::is_valid`] and
    /// [`Endpoint::connection_error`]).
    pub async fn new<C>(parameters: EndpointParameters, connector: &C, user_data: U) -> Self
    where
        C: Connector<Provider = P>,
    {
        Self::with_settings(parameters, connector, user_data, EndpointSettings::default()).await
    }

    /// Constructs an endpoint with explicit settings.
    pub async fn with_settings<C>(
        parameters: EndpointParameters,
        connector: &C,
        user_data: U,
        settings: EndpointSettings,
    ) -> Self
    where
        C: Connector<Provider = P>,
    {
        let mut endpoint = Self {
            parameters,
            provider: None,
            user_data,
            settings,
            connection_error: None,
        };
        if let Err(err) = endpoint.initialize(connector).await {
            error!(error = %err, "endpoint validation failed");
        } else {
            debug!("endpoint created and validated");
        }
        endpoint
    }

    /// Opens a session on the `OSCloud` profile and checks it by listing
    /// images. On success the session replaces any previous one; on failure
    /// the endpoint becomes invalid.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidParameter`] when `OSCloud` is not set
    /// and [`EndpointError::Connection`] when the session cannot be opened
    /// or fails the health check.
    pub async fn initialize<C>(&mut self, connector: &C) -> Result<(), EndpointError>
    where
        C: Connector<Provider = P>,
    {
        match self.connect(connector).await {
            Ok(provider) => {
                self.provider = Some(provider);
                self.connection_error = None;
                Ok(())
            }
            Err(err) => {
                self.provider = None;
                self.connection_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Re-runs the health check on the current session.
    ///
    /// Validity is never re-checked automatically; long-lived callers use
    /// this to detect a session that went stale. A failed check invalidates
    /// the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotConnected`] (or the original connection
    /// error) when there is no session, and [`EndpointError::Connection`]
    /// when the check fails.
    pub async fn revalidate(&mut self) -> Result<(), EndpointError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(self
                .connection_error
                .clone()
                .unwrap_or(EndpointError::NotConnected));
        };
        if let Err(err) = check_connection(provider).await {
            error!(error = %err, "endpoint revalidation failed");
            self.provider = None;
            self.connection_error = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    async fn connect<C>(&self, connector: &C) -> Result<P, EndpointError>
    where
        C: Connector<Provider = P>,
    {
        let profile = self
            .parameters
            .text(OS_CLOUD)
            .ok_or_else(|| EndpointError::InvalidParameter(format!("{OS_CLOUD} is not set")))?;
        let provider = connector
            .connect(&profile)
            .await
            .map_err(|err| EndpointError::Connection(err.to_string()))?;
        check_connection(&provider).await?;
        info!(profile = %profile, "connected to cloud");
        Ok(provider)
    }
}

impl<P, U> Endpoint<P, U> {
    /// Returns `true` when the endpoint holds a validated session.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.provider.is_some()
    }

    /// Returns the error that left the endpoint invalid, if any.
    #[must_use]
    pub const fn connection_error(&self) -> Option<&EndpointError> {
        self.connection_error.as_ref()
    }

    /// Returns the current parameters, including the identifiers written by
    /// the most recent creation.
    #[must_use]
    pub const fn parameters(&self) -> &EndpointParameters {
        &self.parameters
    }

    /// Returns the endpoint settings.
    #[must_use]
    pub const fn settings(&self) -> &EndpointSettings {
        &self.settings
    }

    fn session(&self) -> Result<&P, EndpointError> {
        self.provider.as_ref().ok_or(EndpointError::NotConnected)
    }
}

async fn check_connection<P: Provider>(provider: &P) -> Result<(), EndpointError> {
    provider
        .list_images()
        .await
        .map(|_| ())
        .map_err(|err| EndpointError::Connection(format!("image listing failed: {err}")))
}
