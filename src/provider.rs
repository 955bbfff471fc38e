//! Capability interface for a connected cloud provider session.
//!
//! The endpoint never talks to a cloud API directly. It drives a
//! [`Provider`] obtained from a [`Connector`], so tests can substitute an
//! in-memory double and new clouds only need to implement these two traits.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Boot image known to the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Image {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Sizing bundle offered by the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Flavor {
    /// Provider identifier.
    pub id: String,
    /// Display name (for example `m1.small`).
    pub name: String,
    /// Number of virtual CPUs.
    pub vcpus: u32,
    /// Memory in the provider's unit (usually MiB).
    pub ram: u64,
    /// Root disk size in the provider's unit (usually GiB).
    pub disk: u64,
}

/// SSH keypair registered with the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Keypair {
    /// Keypair name, which doubles as its identifier.
    pub name: String,
}

/// Provider network.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Network {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Network port, typically bound to a server interface.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Port {
    /// Provider identifier.
    pub id: String,
    /// Identifier of the device (server) owning the port, empty when unbound.
    pub device_id: String,
}

/// Floating (public) IP address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FloatingIp {
    /// Provider identifier.
    pub id: String,
    /// Public address.
    pub floating_ip_address: String,
    /// Port the address is attached to, if any.
    pub port_id: Option<String>,
}

/// Compute server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Server {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Provider reported status (for example `BUILD` or `ACTIVE`).
    pub status: String,
}

/// Network attachment requested for a new server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkAttachment {
    /// Network identifier.
    pub uuid: String,
}

/// Parameters for a server-create call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerCreateRequest {
    /// Server name.
    pub name: String,
    /// Boot image identifier.
    pub image_id: String,
    /// Flavor identifier.
    pub flavor_id: String,
    /// Keypair to inject, if any.
    pub key_name: Option<String>,
    /// Base64 encoded user-data payload.
    pub user_data: String,
    /// Networks to attach. Empty means provider default.
    pub networks: Vec<NetworkAttachment>,
}

/// Classification of provider errors the endpoint reacts to.
pub trait ProviderError: std::error::Error + Send + Sync + 'static {
    /// Returns `true` when a name lookup matched more than one resource.
    ///
    /// Ambiguity is a configuration problem, so the endpoint reports it as
    /// [`EndpointError::Ambiguous`] rather than as a retryable failure.
    ///
    /// [`EndpointError::Ambiguous`]: crate::error::EndpointError::Ambiguous
    fn is_ambiguous(&self) -> bool {
        false
    }
}

/// Resource lookup and mutation operations offered by a provider session.
///
/// `find_*` methods return `Ok(None)` when nothing matches; errors are
/// reserved for transport or API failures.
pub trait Provider {
    /// Provider specific error type.
    type Error: ProviderError;

    /// Lists images visible to the session. Used as the health check.
    fn list_images(&self) -> ProviderFuture<'_, Vec<Image>, Self::Error>;

    /// Finds an image by identifier or name.
    fn find_image<'a>(&'a self, name_or_id: &'a str)
    -> ProviderFuture<'a, Option<Image>, Self::Error>;

    /// Finds a flavor by identifier or name.
    fn find_flavor<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Flavor>, Self::Error>;

    /// Finds a keypair by name.
    fn find_keypair<'a>(&'a self, name: &'a str)
    -> ProviderFuture<'a, Option<Keypair>, Self::Error>;

    /// Finds a network by identifier or name.
    fn find_network<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Network>, Self::Error>;

    /// Allocates a floating IP on the given external network.
    fn create_floating_ip<'a>(
        &'a self,
        network_id: &'a str,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error>;

    /// Finds a floating IP by its public address.
    fn find_floating_ip<'a>(
        &'a self,
        address: &'a str,
    ) -> ProviderFuture<'a, Option<FloatingIp>, Self::Error>;

    /// Attaches a floating IP to a port.
    fn attach_floating_ip<'a>(
        &'a self,
        port: &'a Port,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error>;

    /// Detaches a floating IP from whatever port holds it.
    fn detach_floating_ip<'a>(
        &'a self,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error>;

    /// Releases a floating IP back to the pool.
    fn delete_floating_ip<'a>(&'a self, ip: &'a FloatingIp) -> ProviderFuture<'a, (), Self::Error>;

    /// Lists network ports.
    fn list_ports(&self) -> ProviderFuture<'_, Vec<Port>, Self::Error>;

    /// Issues a server-create call.
    fn create_server<'a>(
        &'a self,
        request: &'a ServerCreateRequest,
    ) -> ProviderFuture<'a, Server, Self::Error>;

    /// Blocks until the provider reports the server active.
    fn wait_for_server<'a>(&'a self, server: &'a Server) -> ProviderFuture<'a, Server, Self::Error>;

    /// Finds a server by identifier or name.
    fn find_server<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Server>, Self::Error>;

    /// Requests server deletion. Deletion completes asynchronously.
    fn delete_server<'a>(&'a self, server: &'a Server) -> ProviderFuture<'a, (), Self::Error>;
}

/// Opens provider sessions for named cloud profiles.
pub trait Connector {
    /// Session type produced by this connector.
    type Provider: Provider;
    /// Error raised when a session cannot be established.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establishes a session for `profile`.
    fn connect<'a>(&'a self, profile: &'a str) -> ProviderFuture<'a, Self::Provider, Self::Error>;
}
