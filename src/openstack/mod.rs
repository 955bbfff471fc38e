//! OpenStack implementation of the provider interface.
//!
//! [`OpenStackConnector`] holds named cloud profiles and opens an
//! [`OpenStackSession`] per profile by authenticating against Keystone v3.
//! The session talks to Nova (flavors, keypairs, servers), Glance (images)
//! and Neutron (networks, ports, floating IPs) over their REST APIs using
//! the endpoints from the token's service catalog.

mod auth;
mod compute;
mod error;
mod image;
mod network;
mod wire;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::OpenStackConfig;
use crate::provider::{
    Connector, Flavor, FloatingIp, Image, Keypair, Network, Port, Provider, ProviderFuture, Server,
    ServerCreateRequest,
};
use auth::ServiceEndpoints;

pub use error::OpenStackError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Opens OpenStack sessions for named cloud profiles.
#[derive(Clone, Debug)]
pub struct OpenStackConnector {
    profiles: BTreeMap<String, OpenStackConfig>,
    poll_interval: Duration,
}

impl Default for OpenStackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenStackConnector {
    /// Creates a connector without profiles.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Registers `config` under its own `cloud` name.
    #[must_use]
    pub fn from_config(config: OpenStackConfig) -> Self {
        let name = config.cloud.clone();
        Self::new().with_profile(name, config)
    }

    /// Registers `config` under `name`, replacing any profile of that name.
    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, config: OpenStackConfig) -> Self {
        self.profiles.insert(name.into(), config);
        self
    }

    /// Overrides how often sessions poll a building server.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Names of the registered profiles.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    async fn open_session(&self, profile: &str) -> Result<OpenStackSession, OpenStackError> {
        let Some(config) = self.profiles.get(profile) else {
            return Err(OpenStackError::UnknownProfile(profile.to_owned()));
        };
        config.validate()?;
        let (token, catalog) = auth::authenticate(config).await?;
        let endpoints =
            auth::select_endpoints(&catalog, &config.interface, config.region_name.as_deref())?;
        info!(
            profile,
            compute = %endpoints.compute,
            region = ?config.region_name,
            "opened OpenStack session"
        );
        Ok(OpenStackSession {
            token,
            endpoints,
            poll_interval: self.poll_interval,
        })
    }
}

impl Connector for OpenStackConnector {
    type Provider = OpenStackSession;
    type Error = OpenStackError;

    fn connect<'a>(
        &'a self,
        profile: &'a str,
    ) -> ProviderFuture<'a, OpenStackSession, Self::Error> {
        Box::pin(self.open_session(profile))
    }
}

/// Authenticated session against one OpenStack project.
#[derive(Clone)]
pub struct OpenStackSession {
    token: String,
    endpoints: ServiceEndpoints,
    poll_interval: Duration,
}

impl fmt::Debug for OpenStackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenStackSession")
            .field("token", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl OpenStackSession {
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        HTTP_CLIENT
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .timeout(HTTP_TIMEOUT)
    }

    async fn send(&self, builder: RequestBuilder, url: &Url) -> Result<Response, OpenStackError> {
        builder.send().await.map_err(|err| OpenStackError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, OpenStackError> {
        debug!(url = %url, "GET");
        let builder = self.request(Method::GET, url.clone()).query(query);
        let response = expect_success(self.send(builder, &url).await?).await?;
        decode(response, &url).await
    }

    /// Returns `None` when the resource does not exist.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Option<T>, OpenStackError> {
        debug!(url = %url, "GET");
        let response = self
            .send(self.request(Method::GET, url.clone()), &url)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let checked = expect_success(response).await?;
        decode(checked, &url).await.map(Some)
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T, OpenStackError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!(url = %url, method = %method, "sending request");
        let builder = self.request(method, url.clone()).json(body);
        let response = expect_success(self.send(builder, &url).await?).await?;
        decode(response, &url).await
    }

    async fn delete(&self, url: Url) -> Result<(), OpenStackError> {
        debug!(url = %url, "DELETE");
        let response = self
            .send(self.request(Method::DELETE, url.clone()), &url)
            .await?;
        expect_success(response).await.map(|_| ())
    }
}

impl Provider for OpenStackSession {
    type Error = OpenStackError;

    fn list_images(&self) -> ProviderFuture<'_, Vec<Image>, Self::Error> {
        Box::pin(self.fetch_images())
    }

    fn find_image<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Image>, Self::Error> {
        Box::pin(self.lookup_image(name_or_id))
    }

    fn find_flavor<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Flavor>, Self::Error> {
        Box::pin(self.lookup_flavor(name_or_id))
    }

    fn find_keypair<'a>(
        &'a self,
        name: &'a str,
    ) -> ProviderFuture<'a, Option<Keypair>, Self::Error> {
        Box::pin(self.lookup_keypair(name))
    }

    fn find_network<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Network>, Self::Error> {
        Box::pin(self.lookup_network(name_or_id))
    }

    fn create_floating_ip<'a>(
        &'a self,
        network_id: &'a str,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(self.allocate_floating_ip(network_id))
    }

    fn find_floating_ip<'a>(
        &'a self,
        address: &'a str,
    ) -> ProviderFuture<'a, Option<FloatingIp>, Self::Error> {
        Box::pin(self.lookup_floating_ip(address))
    }

    fn attach_floating_ip<'a>(
        &'a self,
        port: &'a Port,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(self.update_floating_ip(ip, Some(port.id.as_str())))
    }

    fn detach_floating_ip<'a>(
        &'a self,
        ip: &'a FloatingIp,
    ) -> ProviderFuture<'a, FloatingIp, Self::Error> {
        Box::pin(self.update_floating_ip(ip, None))
    }

    fn delete_floating_ip<'a>(&'a self, ip: &'a FloatingIp) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(self.release_floating_ip(ip))
    }

    fn list_ports(&self) -> ProviderFuture<'_, Vec<Port>, Self::Error> {
        Box::pin(self.fetch_ports())
    }

    fn create_server<'a>(
        &'a self,
        request: &'a ServerCreateRequest,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(self.boot_server(request))
    }

    fn wait_for_server<'a>(
        &'a self,
        server: &'a Server,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(self.poll_until_active(server))
    }

    fn find_server<'a>(
        &'a self,
        name_or_id: &'a str,
    ) -> ProviderFuture<'a, Option<Server>, Self::Error> {
        Box::pin(self.lookup_server(name_or_id))
    }

    fn delete_server<'a>(&'a self, server: &'a Server) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(self.remove_server(server))
    }
}

/// Appends percent-encoded path segments to a service base URL.
fn resource_url(base: &Url, segments: &[&str]) -> Result<Url, OpenStackError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| OpenStackError::InvalidUrl {
            url: base.to_string(),
            message: String::from("URL cannot carry a path"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Resolves a name lookup that must match at most once.
fn pick_unique<T>(
    resource: &str,
    name: &str,
    matches: Vec<T>,
) -> Result<Option<T>, OpenStackError> {
    let count = matches.len();
    if count > 1 {
        return Err(OpenStackError::Ambiguous {
            resource: resource.to_owned(),
            name: name.to_owned(),
            count,
        });
    }
    Ok(matches.into_iter().next())
}

async fn expect_success(response: Response) -> Result<Response, OpenStackError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(OpenStackError::Api {
        status: status.as_u16(),
        url,
        message: api_message(&body),
    })
}

/// Extracts the human readable message from an OpenStack fault body such as
/// `{"itemNotFound": {"message": "...", "code": 404}}` or
/// `{"NeutronError": {"message": "..."}}`.
fn api_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(serde_json::Value::as_object)
        .and_then(|fault| {
            fault
                .values()
                .find_map(|detail| detail.get("message").and_then(serde_json::Value::as_str))
        })
        .map_or_else(|| body.trim().to_owned(), str::to_owned)
}

async fn decode<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, OpenStackError> {
    response.json().await.map_err(|err| OpenStackError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests;
