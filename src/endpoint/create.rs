//! Single instance creation.
//!
//! Creation walks through the stages of [`CreationStage`]. Resolution
//! failures return before any server exists. Once a floating IP or a server
//! has been allocated, a later failure rolls both back on a best-effort
//! basis: the original error is always the one returned, and rollback
//! problems are only logged.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::EndpointError;
use crate::instance::{InstanceDescriptor, InstanceId, InstanceRecord};
use crate::parameters::{CE_TYPE, DEFAULT_VM_TYPE, EndpointParameters, VM_TYPE, VM_UUID};
use crate::provider::{FloatingIp, NetworkAttachment, Provider, Server, ServerCreateRequest};
use crate::resolver::{ResolvedResources, ResourceResolver};
use crate::user_data::UserDataBuilder;

use super::{Endpoint, EndpointSettings};

/// Progress of a single instance creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreationStage {
    /// Nothing resolved yet.
    Init,
    /// Image, flavor, keypair, networks and floating IP resolved.
    Resolved,
    /// User-data built and encoded.
    UserDataReady,
    /// Server-create call accepted by the provider.
    ServerRequested,
    /// Provider reports the server active.
    ServerActive,
    /// Floating IP attached to the server's port.
    IpAttached,
    /// Descriptor assembled.
    Done,
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "init",
            Self::Resolved => "resolved",
            Self::UserDataReady => "user-data ready",
            Self::ServerRequested => "server requested",
            Self::ServerActive => "server active",
            Self::IpAttached => "IP attached",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

impl<P, U> Endpoint<P, U>
where
    P: Provider,
    U: UserDataBuilder,
{
    /// Creates one instance and returns its server id and descriptor.
    ///
    /// A fresh 8 character identifier is generated when `instance_id` is
    /// `None`. The identifier and the instance type are written to the
    /// `VMUUID` and `VMType` parameters before user-data is built.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotConnected`] on an invalid endpoint,
    /// resolution errors for unusable parameters,
    /// [`EndpointError::UserData`] when the payload cannot be built,
    /// [`EndpointError::Timeout`] when the server does not become active in
    /// time, and [`EndpointError::ProviderFailure`] for provider failures.
    pub async fn create_instance(
        &mut self,
        instance_id: Option<InstanceId>,
    ) -> Result<InstanceRecord, EndpointError> {
        let instance_id = instance_id.unwrap_or_else(InstanceId::generate);
        self.parameters.set(VM_UUID, instance_id.as_str());
        let vm_type = self
            .parameters
            .text(CE_TYPE)
            .unwrap_or_else(|| DEFAULT_VM_TYPE.to_owned());
        self.parameters.set(VM_TYPE, vm_type);

        let creator = InstanceCreator {
            provider: self.session()?,
            user_data: &self.user_data,
            settings: &self.settings,
        };
        creator.create(&self.parameters, &instance_id).await
    }
}

struct InstanceCreator<'a, P, U> {
    provider: &'a P,
    user_data: &'a U,
    settings: &'a EndpointSettings,
}

impl<P, U> InstanceCreator<'_, P, U>
where
    P: Provider,
    U: UserDataBuilder,
{
    async fn create(
        &self,
        params: &EndpointParameters,
        instance_id: &InstanceId,
    ) -> Result<InstanceRecord, EndpointError> {
        trace_stage(instance_id, CreationStage::Init);
        let resolved = ResourceResolver::new(self.provider).resolve(params).await?;
        trace_stage(instance_id, CreationStage::Resolved);

        let mut server = None;
        let result = self.provision(params, instance_id, &resolved, &mut server).await;
        if let Err(err) = &result {
            warn!(instance_id = %instance_id, error = %err, "instance creation failed");
            self.roll_back(server.as_ref(), resolved.floating_ip.as_ref()).await;
        }
        result
    }

    async fn provision(
        &self,
        params: &EndpointParameters,
        instance_id: &InstanceId,
        resolved: &ResolvedResources,
        created: &mut Option<Server>,
    ) -> Result<InstanceRecord, EndpointError> {
        let payload = self
            .user_data
            .build(params)
            .map_err(|err| EndpointError::UserData(err.to_string()))?;
        let request = ServerCreateRequest {
            name: format!("{}_{instance_id}", self.settings.server_name_prefix),
            image_id: resolved.image.id.clone(),
            flavor_id: resolved.flavor.id.clone(),
            key_name: resolved.keypair.as_ref().map(|key| key.name.clone()),
            user_data: STANDARD.encode(payload),
            networks: resolved
                .network
                .iter()
                .map(|net| NetworkAttachment {
                    uuid: net.id.clone(),
                })
                .collect(),
        };
        trace_stage(instance_id, CreationStage::UserDataReady);

        let server = self
            .provider
            .create_server(&request)
            .await
            .map_err(|err| {
                EndpointError::provider(format!("create server {}", request.name), &err)
            })?;
        *created = Some(server.clone());
        debug!(instance_id = %instance_id, server_id = %server.id, "waiting for server to build");
        trace_stage(instance_id, CreationStage::ServerRequested);

        let active = self.wait_until_active(&server).await?;
        trace_stage(instance_id, CreationStage::ServerActive);

        let public_ip = match &resolved.floating_ip {
            Some(ip) => {
                let attached = self.attach_floating_ip(&active, ip).await?;
                trace_stage(instance_id, CreationStage::IpAttached);
                Some(attached.floating_ip_address)
            }
            None => None,
        };

        let descriptor = InstanceDescriptor::new(instance_id.clone(), &resolved.flavor, public_ip);
        trace_stage(instance_id, CreationStage::Done);
        info!(
            instance_id = %instance_id,
            server_id = %active.id,
            public_ip = ?descriptor.public_ip,
            "created instance"
        );
        Ok(InstanceRecord {
            server_id: active.id,
            descriptor,
        })
    }

    async fn wait_until_active(&self, server: &Server) -> Result<Server, EndpointError> {
        match timeout(
            self.settings.wait_timeout,
            self.provider.wait_for_server(server),
        )
        .await
        {
            Ok(Ok(active)) => Ok(active),
            Ok(Err(err)) => Err(EndpointError::provider(
                format!("wait for server {}", server.id),
                &err,
            )),
            Err(_elapsed) => Err(EndpointError::Timeout {
                action: String::from("server to become active"),
                id: server.id.clone(),
            }),
        }
    }

    async fn attach_floating_ip(
        &self,
        server: &Server,
        ip: &FloatingIp,
    ) -> Result<FloatingIp, EndpointError> {
        let ports = self
            .provider
            .list_ports()
            .await
            .map_err(|err| EndpointError::provider("list ports", &err))?;
        let port = ports
            .into_iter()
            .find(|port| port.device_id == server.id)
            .ok_or_else(|| EndpointError::not_found("port for server", server.id.clone()))?;
        self.provider
            .attach_floating_ip(&port, ip)
            .await
            .map_err(|err| {
                EndpointError::provider(
                    format!(
                        "attach floating IP {} to port {}",
                        ip.floating_ip_address, port.id
                    ),
                    &err,
                )
            })
    }

    async fn roll_back(&self, server: Option<&Server>, ip: Option<&FloatingIp>) {
        if let Some(created) = server {
            match self.provider.delete_server(created).await {
                Ok(()) => debug!(server_id = %created.id, "rolled back server"),
                Err(err) => {
                    warn!(server_id = %created.id, error = %err, "failed to roll back server");
                }
            }
        }
        if let Some(allocated) = ip {
            match self.provider.delete_floating_ip(allocated).await {
                Ok(()) => debug!(address = %allocated.floating_ip_address, "released floating IP"),
                Err(err) => warn!(
                    address = %allocated.floating_ip_address,
                    error = %err,
                    "failed to release floating IP"
                ),
            }
        }
    }
}

fn trace_stage(instance_id: &InstanceId, stage: CreationStage) {
    debug!(instance_id = %instance_id, stage = %stage, "instance creation stage");
}
