//! Request and response bodies for the OpenStack REST APIs.

use serde::{Deserialize, Serialize};

use crate::provider::{
    Flavor, FloatingIp, Image, Keypair, Network, Port, Server, ServerCreateRequest,
};

/// Glance allows images without a name.
#[derive(Debug, Deserialize)]
pub(super) struct ImageWire {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<ImageWire> for Image {
    fn from(value: ImageWire) -> Self {
        Self {
            id: value.id,
            name: value.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageList {
    pub(super) images: Vec<ImageWire>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FlavorList {
    pub(super) flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FlavorEnvelope {
    pub(super) flavor: Flavor,
}

#[derive(Debug, Deserialize)]
pub(super) struct KeypairEnvelope {
    pub(super) keypair: Keypair,
}

#[derive(Debug, Deserialize)]
pub(super) struct NetworkList {
    pub(super) networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
pub(super) struct NetworkEnvelope {
    pub(super) network: Network,
}

#[derive(Debug, Deserialize)]
pub(super) struct PortList {
    pub(super) ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FloatingIpList {
    pub(super) floatingips: Vec<FloatingIp>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FloatingIpEnvelope {
    pub(super) floatingip: FloatingIp,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerList {
    pub(super) servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerEnvelope {
    pub(super) server: Server,
}

/// Nova answers a create call with the id only.
#[derive(Debug, Deserialize)]
pub(super) struct CreatedServer {
    pub(super) id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatedServerEnvelope {
    pub(super) server: CreatedServer,
}

#[derive(Debug, Serialize)]
pub(super) struct ServerCreateBody<'a> {
    server: ServerCreateFields<'a>,
}

#[derive(Debug, Serialize)]
struct ServerCreateFields<'a> {
    name: &'a str,
    #[serde(rename = "imageRef")]
    image_ref: &'a str,
    #[serde(rename = "flavorRef")]
    flavor_ref: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_name: Option<&'a str>,
    user_data: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    networks: Vec<NetworkRef<'a>>,
}

#[derive(Debug, Serialize)]
struct NetworkRef<'a> {
    uuid: &'a str,
}

impl<'a> From<&'a ServerCreateRequest> for ServerCreateBody<'a> {
    fn from(request: &'a ServerCreateRequest) -> Self {
        Self {
            server: ServerCreateFields {
                name: &request.name,
                image_ref: &request.image_id,
                flavor_ref: &request.flavor_id,
                key_name: request.key_name.as_deref(),
                user_data: &request.user_data,
                networks: request
                    .networks
                    .iter()
                    .map(|net| NetworkRef { uuid: &net.uuid })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct FloatingIpCreateBody<'a> {
    floatingip: FloatingIpCreate<'a>,
}

#[derive(Debug, Serialize)]
struct FloatingIpCreate<'a> {
    floating_network_id: &'a str,
}

impl<'a> FloatingIpCreateBody<'a> {
    pub(super) const fn on_network(network_id: &'a str) -> Self {
        Self {
            floatingip: FloatingIpCreate {
                floating_network_id: network_id,
            },
        }
    }
}

/// `port_id: null` detaches the address.
#[derive(Debug, Serialize)]
pub(super) struct FloatingIpUpdateBody<'a> {
    floatingip: FloatingIpUpdate<'a>,
}

#[derive(Debug, Serialize)]
struct FloatingIpUpdate<'a> {
    port_id: Option<&'a str>,
}

impl<'a> FloatingIpUpdateBody<'a> {
    pub(super) const fn attach(port_id: &'a str) -> Self {
        Self {
            floatingip: FloatingIpUpdate {
                port_id: Some(port_id),
            },
        }
    }

    pub(super) const fn detach() -> Self {
        Self {
            floatingip: FloatingIpUpdate { port_id: None },
        }
    }
}
