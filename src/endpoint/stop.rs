//! Instance teardown.

use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::error::EndpointError;
use crate::provider::{Provider, ProviderError};

use super::Endpoint;

impl<P: Provider, U> Endpoint<P, U> {
    /// Releases the instance's floating IP (when given) and deletes the
    /// server identified by the provider id `node_id`.
    ///
    /// The floating IP is detached and deleted before the server is looked
    /// up, so it is released even when the server turns out to be gone.
    /// Server deletion is asynchronous on the provider side; it is only
    /// confirmed when [`EndpointSettings::confirm_deletion`] is set.
    ///
    /// [`EndpointSettings::confirm_deletion`]: super::EndpointSettings::confirm_deletion
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] when the floating IP or the server
    /// does not exist, [`EndpointError::Ambiguous`] when either lookup
    /// matches several resources, [`EndpointError::Timeout`] when deletion
    /// is not confirmed in time, and [`EndpointError::ProviderFailure`]
    /// naming the node when a provider call fails.
    pub async fn stop_vm(
        &self,
        node_id: &str,
        public_ip: Option<&str>,
    ) -> Result<(), EndpointError> {
        let provider = self.session()?;

        if let Some(address) = public_ip.filter(|address| !address.trim().is_empty()) {
            release_floating_ip(provider, node_id, address).await?;
        }

        let server = provider
            .find_server(node_id)
            .await
            .map_err(|err| terminate_lookup_error(node_id, "server", node_id, &err))?
            .ok_or_else(|| EndpointError::not_found("server", node_id))?;

        provider
            .delete_server(&server)
            .await
            .map_err(|err| terminate_error(node_id, &err))?;

        if self.settings.confirm_deletion {
            self.wait_until_gone(provider, node_id).await?;
        }

        info!(node_id, "stopped instance");
        Ok(())
    }

    async fn wait_until_gone(&self, provider: &P, node_id: &str) -> Result<(), EndpointError> {
        let poll = async {
            loop {
                match provider.find_server(node_id).await {
                    Ok(None) => return Ok(()),
                    Ok(Some(_)) => sleep(self.settings.poll_interval).await,
                    Err(err) => {
                        return Err(terminate_lookup_error(node_id, "server", node_id, &err));
                    }
                }
            }
        };

        timeout(self.settings.wait_timeout, poll)
            .await
            .unwrap_or_else(|_elapsed| {
                Err(EndpointError::Timeout {
                    action: String::from("server deletion"),
                    id: node_id.to_owned(),
                })
            })
    }
}

async fn release_floating_ip<P: Provider>(
    provider: &P,
    node_id: &str,
    address: &str,
) -> Result<(), EndpointError> {
    let ip = provider
        .find_floating_ip(address)
        .await
        .map_err(|err| terminate_lookup_error(node_id, "floating IP", address, &err))?
        .ok_or_else(|| EndpointError::not_found("floating IP", address))?;
    let detached = provider
        .detach_floating_ip(&ip)
        .await
        .map_err(|err| terminate_error(node_id, &err))?;
    provider
        .delete_floating_ip(&detached)
        .await
        .map_err(|err| terminate_error(node_id, &err))?;
    debug!(node_id, address, "released floating IP");
    Ok(())
}

fn terminate_error(node_id: &str, err: &impl std::fmt::Display) -> EndpointError {
    EndpointError::provider(format!("terminate instance {node_id}"), err)
}

fn terminate_lookup_error<E: ProviderError>(
    node_id: &str,
    resource: &str,
    name: &str,
    err: &E,
) -> EndpointError {
    EndpointError::lookup(format!("terminate instance {node_id}"), resource, name, err)
}
