//! Nova flavors, keypairs and servers.

use reqwest::Method;
use tokio::time::sleep;
use tracing::debug;

use crate::provider::{Flavor, Keypair, Server, ServerCreateRequest};

use super::wire::{
    CreatedServerEnvelope, FlavorEnvelope, FlavorList, KeypairEnvelope, ServerCreateBody,
    ServerEnvelope, ServerList,
};
use super::{OpenStackError, OpenStackSession, pick_unique, resource_url};

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_ERROR: &str = "ERROR";
const STATUS_BUILD: &str = "BUILD";

impl OpenStackSession {
    pub(super) async fn lookup_flavor(
        &self,
        name_or_id: &str,
    ) -> Result<Option<Flavor>, OpenStackError> {
        let by_id = resource_url(&self.endpoints.compute, &["flavors", name_or_id])?;
        if let Some(found) = self.get_optional::<FlavorEnvelope>(by_id).await? {
            return Ok(Some(found.flavor));
        }

        // Nova has no server-side name filter for flavors.
        let url = resource_url(&self.endpoints.compute, &["flavors", "detail"])?;
        let list: FlavorList = self.get_json(url, &[]).await?;
        let matches = list
            .flavors
            .into_iter()
            .filter(|flavor| flavor.name == name_or_id)
            .collect();
        pick_unique("flavor", name_or_id, matches)
    }

    pub(super) async fn lookup_keypair(
        &self,
        name: &str,
    ) -> Result<Option<Keypair>, OpenStackError> {
        let url = resource_url(&self.endpoints.compute, &["os-keypairs", name])?;
        Ok(self
            .get_optional::<KeypairEnvelope>(url)
            .await?
            .map(|found| found.keypair))
    }

    pub(super) async fn boot_server(
        &self,
        request: &ServerCreateRequest,
    ) -> Result<Server, OpenStackError> {
        let url = resource_url(&self.endpoints.compute, &["servers"])?;
        let created: CreatedServerEnvelope = self
            .send_json(Method::POST, url, &ServerCreateBody::from(request))
            .await?;
        debug!(server_id = %created.server.id, name = %request.name, "server create accepted");
        Ok(Server {
            id: created.server.id,
            name: request.name.clone(),
            status: STATUS_BUILD.to_owned(),
        })
    }

    /// Polls the server until Nova reports it `ACTIVE`. The caller bounds
    /// the wait.
    pub(super) async fn poll_until_active(
        &self,
        server: &Server,
    ) -> Result<Server, OpenStackError> {
        let url = resource_url(&self.endpoints.compute, &["servers", server.id.as_str()])?;
        loop {
            let Some(current) = self.get_optional::<ServerEnvelope>(url.clone()).await? else {
                return Err(OpenStackError::ServerGone {
                    id: server.id.clone(),
                });
            };
            match current.server.status.as_str() {
                STATUS_ACTIVE => return Ok(current.server),
                STATUS_ERROR => {
                    return Err(OpenStackError::ServerFault {
                        id: current.server.id,
                        status: current.server.status,
                    });
                }
                status => debug!(server_id = %server.id, status, "server not active yet"),
            }
            sleep(self.poll_interval).await;
        }
    }

    pub(super) async fn lookup_server(
        &self,
        name_or_id: &str,
    ) -> Result<Option<Server>, OpenStackError> {
        let by_id = resource_url(&self.endpoints.compute, &["servers", name_or_id])?;
        if let Some(found) = self.get_optional::<ServerEnvelope>(by_id).await? {
            return Ok(Some(found.server));
        }

        // The name filter is a regular expression; keep exact matches only.
        let url = resource_url(&self.endpoints.compute, &["servers", "detail"])?;
        let list: ServerList = self.get_json(url, &[("name", name_or_id)]).await?;
        let matches = list
            .servers
            .into_iter()
            .filter(|server| server.name == name_or_id)
            .collect();
        pick_unique("server", name_or_id, matches)
    }

    pub(super) async fn remove_server(&self, server: &Server) -> Result<(), OpenStackError> {
        let url = resource_url(&self.endpoints.compute, &["servers", server.id.as_str()])?;
        self.delete(url).await?;
        debug!(server_id = %server.id, "server delete accepted");
        Ok(())
    }
}
