//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeProvider`] keeps provider state in memory, records every call in
//! order, and can be scripted to fail or stall at specific steps.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::provider::{
    Connector, Flavor, FloatingIp, Image, Keypair, Network, Port, Provider, ProviderError,
    ProviderFuture, Server, ServerCreateRequest,
};

/// A single call made through [`FakeProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `list_images`.
    ListImages,
    /// `find_image` with the lookup key.
    FindImage(String),
    /// `find_flavor` with the lookup key.
    FindFlavor(String),
    /// `find_keypair` with the lookup key.
    FindKeypair(String),
    /// `find_network` with the lookup key.
    FindNetwork(String),
    /// `create_floating_ip` with the network id.
    CreateFloatingIp(String),
    /// `find_floating_ip` with the address.
    FindFloatingIp(String),
    /// `attach_floating_ip`.
    AttachFloatingIp {
        /// Port the address was attached to.
        port_id: String,
        /// Public address.
        address: String,
    },
    /// `detach_floating_ip` with the address.
    DetachFloatingIp(String),
    /// `delete_floating_ip` with the address.
    DeleteFloatingIp(String),
    /// `list_ports`.
    ListPorts,
    /// `create_server` with the full request.
    CreateServer(ServerCreateRequest),
    /// `wait_for_server` with the server id.
    WaitForServer(String),
    /// `find_server` with the lookup key.
    FindServer(String),
    /// `delete_server` with the server id.
    DeleteServer(String),
}

/// Error returned by [`FakeProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeProviderError {
    /// Failure injected by a test.
    #[error("fake provider failure: {0}")]
    Scripted(String),
    /// A name lookup matched several resources.
    #[error("{count} {resource} resources are named {name}")]
    Ambiguous {
        /// Kind of resource looked up.
        resource: String,
        /// Name used for the lookup.
        name: String,
        /// Number of matches.
        count: usize,
    },
}

impl ProviderError for FakeProviderError {
    fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}

/// Resources looked up by identifier or name.
trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Named for Image {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Flavor {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Network {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Server {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Finds by identifier first, then by exact name. Several name matches are
/// reported as ambiguous, as a real cloud would.
fn find_unique<T: Named + Clone>(
    resource: &str,
    name_or_id: &str,
    items: &[T],
) -> Result<Option<T>, FakeProviderError> {
    if let Some(found) = items.iter().find(|item| item.id() == name_or_id) {
        return Ok(Some(found.clone()));
    }
    let matches: Vec<&T> = items.iter().filter(|item| item.name() == name_or_id).collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        several => Err(FakeProviderError::Ambiguous {
            resource: resource.to_owned(),
            name: name_or_id.to_owned(),
            count: several.len(),
        }),
    }
}

#[derive(Debug, Default)]
struct State {
    images: Vec<Image>,
    flavors: Vec<Flavor>,
    keypairs: Vec<Keypair>,
    networks: Vec<Network>,
    ports: Vec<Port>,
    floating_ips: Vec<FloatingIp>,
    servers: Vec<Server>,
    calls: Vec<ProviderCall>,
    next_id: u32,
    create_server_attempts: u32,
    fail_create_server_on: Option<u32>,
    fail_list_images: bool,
    fail_delete_server: bool,
    fail_attach_floating_ip: bool,
    stall_wait: bool,
    skip_ports: bool,
    retain_deleted_servers: bool,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory provider double.
#[derive(Clone, Debug, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
}

impl FakeProvider {
    /// Creates a provider with no resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider stocked with two images, two flavors, the `ops`
    /// keypair and the `private`/`public` networks.
    #[must_use]
    pub fn stocked() -> Self {
        let provider = Self::new();
        provider.add_image("img-ubuntu", "ubuntu-24.04");
        provider.add_image("img-centos", "centos-9");
        provider.add_flavor(Flavor {
            id: String::from("f-small"),
            name: String::from("m1.small"),
            vcpus: 2,
            ram: 4096,
            disk: 40,
        });
        provider.add_flavor(Flavor {
            id: String::from("f-large"),
            name: String::from("m1.large"),
            vcpus: 8,
            ram: 16384,
            disk: 160,
        });
        provider.add_keypair("ops");
        provider.add_network("net-private", "private");
        provider.add_network("net-public", "public");
        provider
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Registers an image.
    pub fn add_image(&self, id: &str, name: &str) {
        self.state().images.push(Image {
            id: id.to_owned(),
            name: name.to_owned(),
        });
    }

    /// Registers a flavor.
    pub fn add_flavor(&self, flavor: Flavor) {
        self.state().flavors.push(flavor);
    }

    /// Registers a keypair.
    pub fn add_keypair(&self, name: &str) {
        self.state().keypairs.push(Keypair {
            name: name.to_owned(),
        });
    }

    /// Registers a network.
    pub fn add_network(&self, id: &str, name: &str) {
        self.state().networks.push(Network {
            id: id.to_owned(),
            name: name.to_owned(),
        });
    }

    /// Registers an existing floating IP.
    pub fn add_floating_ip(&self, id: &str, address: &str, port_id: Option<&str>) {
        self.state().floating_ips.push(FloatingIp {
            id: id.to_owned(),
            floating_ip_address: address.to_owned(),
            port_id: port_id.map(str::to_owned),
        });
    }

    /// Registers an existing server and its port.
    pub fn add_server(&self, id: &str, name: &str) {
        let mut state = self.state();
        state.servers.push(Server {
            id: id.to_owned(),
            name: name.to_owned(),
            status: String::from("ACTIVE"),
        });
        let port_id = state.next_id("port");
        state.ports.push(Port {
            id: port_id,
            device_id: id.to_owned(),
        });
    }

    /// Fails the `n`th server-create call (1-based).
    pub fn fail_create_server_on(&self, attempt: u32) {
        self.state().fail_create_server_on = Some(attempt);
    }

    /// Fails the image listing used as the connection health check.
    pub fn fail_list_images(&self) {
        self.state().fail_list_images = true;
    }

    /// Fails every server-delete call.
    pub fn fail_delete_server(&self) {
        self.state().fail_delete_server = true;
    }

    /// Fails every floating-IP attach call.
    pub fn fail_attach_floating_ip(&self) {
        self.state().fail_attach_floating_ip = true;
    }

    /// Makes `wait_for_server` never complete.
    pub fn stall_wait(&self) {
        self.state().stall_wait = true;
    }

    /// Creates servers without a network port.
    pub fn skip_ports(&self) {
        self.state().skip_ports = true;
    }

    /// Keeps deleted servers visible, as a provider with slow teardown would.
    pub fn retain_deleted_servers(&self) {
        self.state().retain_deleted_servers = true;
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Counts calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of floating IPs currently allocated.
    #[must_use]
    pub fn floating_ip_count(&self) -> usize {
        self.state().floating_ips.len()
    }

    /// Returns the floating IP with `address`.
    #[must_use]
    pub fn floating_ip(&self, address: &str) -> Option<FloatingIp> {
        self.state()
            .floating_ips
            .iter()
            .find(|ip| ip.floating_ip_address == address)
            .cloned()
    }

    /// Returns the ports currently known.
    #[must_use]
    pub fn ports(&self) -> Vec<Port> {
        self.state().ports.clone()
    }

    /// Returns the servers currently known.
    #[must_use]
    pub fn servers(&self) -> Vec<Server> {
        self.state().servers.clone()
    }

    fn record(&self, call: ProviderCall) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

impl Provider for FakeProvider {
    type Error = FakeProviderError;

    fn list_images(&self) -> ProviderFuture<'_, Vec<Image>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::ListImages);
            if state.fail_list_images {
                return Err(FakeProviderError::Scripted(String::from(
                    "image service unavailable",
                )));
            }
            Ok(state.images.clone())
        })
    }

    fn find_image<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Image>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindImage(name_or_id.to_owned()));
            find_unique("image", name_or_id, &state.images)
        })
    }

    fn find_flavor<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Flavor>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindFlavor(name_or_id.to_owned()));
            find_unique("flavor", name_or_id, &state.flavors)
        })
    }

    fn find_keypair<'a>(
        &'a self,
        name: &'a str,
    ) -> ProviderFuture<'a, Option<Keypair>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindKeypair(name.to_owned()));
            Ok(state.keypairs.iter().find(|key| key.name == name).cloned())
        })
    }

    fn find_network<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Network>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindNetwork(name_or_id.to_owned()));
            find_unique("network", name_or_id, &state.networks)
        })
    }

    fn create_floating_ip<'a>(
        &'a self,
        network_id: &'a str,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::CreateFloatingIp(network_id.to_owned()));
            let id = state.next_id("fip");
            let address = format!("203.0.113.{}", state.next_id);
            let ip = FloatingIp {
                id,
                floating_ip_address: address,
                port_id: None,
            };
            state.floating_ips.push(ip.clone());
            Ok(ip)
        })
    }

    fn find_floating_ip<'a>(
        &'a self,
        address: &'a str,
    ) -> ProviderFuture<'a, Option<FloatingIp>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindFloatingIp(address.to_owned()));
            Ok(state
                .floating_ips
                .iter()
                .find(|ip| ip.floating_ip_address == address)
                .cloned())
        })
    }

    fn attach_floating_ip<'a>(
        &'a self,
        port: &'a Port,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::AttachFloatingIp {
                port_id: port.id.clone(),
                address: ip.floating_ip_address.clone(),
            });
            if state.fail_attach_floating_ip {
                return Err(FakeProviderError::Scripted(String::from("port busy")));
            }
            let Some(stored) = state
                .floating_ips
                .iter_mut()
                .find(|candidate| candidate.id == ip.id)
            else {
                return Err(FakeProviderError::Scripted(format!("no floating IP {}", ip.id)));
            };
            stored.port_id = Some(port.id.clone());
            Ok(stored.clone())
        })
    }

    fn detach_floating_ip<'a>(
        &'a self,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(async move {
            let mut state =
                self.record(ProviderCall::DetachFloatingIp(ip.floating_ip_address.clone()));
            let Some(stored) = state
                .floating_ips
                .iter_mut()
                .find(|candidate| candidate.id == ip.id)
            else {
                return Err(FakeProviderError::Scripted(format!("no floating IP {}", ip.id)));
            };
            stored.port_id = None;
            Ok(stored.clone())
        })
    }

    fn delete_floating_ip<'a>(&'a self, ip: &'a FloatingIp) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state =
                self.record(ProviderCall::DeleteFloatingIp(ip.floating_ip_address.clone()));
            state.floating_ips.retain(|candidate| candidate.id != ip.id);
            Ok(())
        })
    }

    fn list_ports(&self) -> ProviderFuture<'_, Vec<Port>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::ListPorts);
            Ok(state.ports.clone())
        })
    }

    fn create_server<'a>(
        &'a self,
        request: &'a ServerCreateRequest,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::CreateServer(request.clone()));
            state.create_server_attempts += 1;
            if state.fail_create_server_on == Some(state.create_server_attempts) {
                return Err(FakeProviderError::Scripted(String::from("quota exceeded")));
            }
            let id = state.next_id("srv");
            let server = Server {
                id: id.clone(),
                name: request.name.clone(),
                status: String::from("BUILD"),
            };
            state.servers.push(server.clone());
            if !state.skip_ports {
                let port_id = state.next_id("port");
                state.ports.push(Port {
                    id: port_id,
                    device_id: id,
                });
            }
            Ok(server)
        })
    }

    fn wait_for_server<'a>(
        &'a self,
        server: &'a Server,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(async move {
            let stall = {
                let state = self.record(ProviderCall::WaitForServer(server.id.clone()));
                state.stall_wait
            };
            if stall {
                std::future::pending::<()>().await;
            }
            let mut state = self.state();
            let Some(stored) = state
                .servers
                .iter_mut()
                .find(|candidate| candidate.id == server.id)
            else {
                return Err(FakeProviderError::Scripted(format!("no server {}", server.id)));
            };
            stored.status = String::from("ACTIVE");
            Ok(stored.clone())
        })
    }

    fn find_server<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Server>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ProviderCall::FindServer(name_or_id.to_owned()));
            find_unique("server", name_or_id, &state.servers)
        })
    }

    fn delete_server<'a>(&'a self, server: &'a Server) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::DeleteServer(server.id.clone()));
            if state.fail_delete_server {
                return Err(FakeProviderError::Scripted(String::from("server locked")));
            }
            if !state.retain_deleted_servers {
                state.servers.retain(|candidate| candidate.id != server.id);
                state.ports.retain(|port| port.device_id != server.id);
            }
            Ok(())
        })
    }
}

/// Connector handing out a shared [`FakeProvider`].
#[derive(Clone, Debug, Default)]
pub struct FakeConnector {
    provider: FakeProvider,
    refuse: Option<String>,
    profiles: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    /// Creates a connector that hands out `provider`.
    #[must_use]
    pub fn new(provider: FakeProvider) -> Self {
        Self {
            provider,
            refuse: None,
            profiles: Arc::default(),
        }
    }

    /// Makes every connection attempt fail with `message`.
    #[must_use]
    pub fn refusing(mut self, message: &str) -> Self {
        self.refuse = Some(message.to_owned());
        self
    }

    /// Profiles passed to `connect`, in order.
    #[must_use]
    pub fn profiles(&self) -> Vec<String> {
        self.profiles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Connector for FakeConnector {
    type Provider = FakeProvider;
    type Error = FakeProviderError;

    fn connect<'a>(&'a self, profile: &'a str) -> ProviderFuture<'a, FakeProvider, Self::Error> {
        Box::pin(async move {
            self.profiles
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(profile.to_owned());
            match &self.refuse {
                Some(message) => Err(FakeProviderError::Scripted(message.clone())),
                None => Ok(self.provider.clone()),
            }
        })
    }
}
