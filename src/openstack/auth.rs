//! Keystone v3 password authentication and service catalog selection.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenStackConfig;

use super::{HTTP_CLIENT, HTTP_TIMEOUT, OpenStackError, expect_success};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

#[derive(Debug, Serialize)]
pub(super) struct AuthRequest<'a> {
    auth: Auth<'a>,
}

#[derive(Debug, Serialize)]
struct Auth<'a> {
    identity: Identity<'a>,
    scope: Scope<'a>,
}

#[derive(Debug, Serialize)]
struct Identity<'a> {
    methods: [&'static str; 1],
    password: PasswordMethod<'a>,
}

#[derive(Debug, Serialize)]
struct PasswordMethod<'a> {
    user: UserCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct UserCredentials<'a> {
    name: &'a str,
    domain: DomainRef<'a>,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct Scope<'a> {
    project: ProjectRef<'a>,
}

#[derive(Debug, Serialize)]
struct ProjectRef<'a> {
    name: &'a str,
    domain: DomainRef<'a>,
}

#[derive(Debug, Serialize)]
struct DomainRef<'a> {
    name: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub(super) fn password(config: &'a OpenStackConfig) -> Self {
        Self {
            auth: Auth {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: UserCredentials {
                            name: config.username.as_str(),
                            domain: DomainRef {
                                name: config.user_domain_name.as_str(),
                            },
                            password: config.password.as_str(),
                        },
                    },
                },
                scope: Scope {
                    project: ProjectRef {
                        name: config.project_name.as_str(),
                        domain: DomainRef {
                            name: config.project_domain_name.as_str(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) token: TokenBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenBody {
    #[serde(default)]
    pub(super) catalog: Vec<CatalogEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct CatalogEntry {
    #[serde(rename = "type")]
    pub(super) service_type: String,
    #[serde(default)]
    pub(super) endpoints: Vec<CatalogEndpoint>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct CatalogEndpoint {
    pub(super) interface: String,
    pub(super) url: String,
    #[serde(default)]
    pub(super) region_id: Option<String>,
    #[serde(default)]
    pub(super) region: Option<String>,
}

impl CatalogEndpoint {
    fn in_region(&self, region: Option<&str>) -> bool {
        region.is_none_or(|wanted| {
            self.region_id.as_deref() == Some(wanted) || self.region.as_deref() == Some(wanted)
        })
    }
}

/// Base URLs of the services a session talks to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct ServiceEndpoints {
    pub(super) compute: Url,
    pub(super) image: Url,
    pub(super) network: Url,
}

/// Returns the token request URL for a configured Keystone URL, which may
/// or may not carry the `/v3` suffix.
pub(super) fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

/// Authenticates with a project-scoped password token.
pub(super) async fn authenticate(
    config: &OpenStackConfig,
) -> Result<(String, Vec<CatalogEntry>), OpenStackError> {
    let url = tokens_url(&config.auth_url);
    debug!(url = %url, user = %config.username, project = %config.project_name, "requesting token");
    let response = HTTP_CLIENT
        .post(&url)
        .json(&AuthRequest::password(config))
        .timeout(HTTP_TIMEOUT)
        .send()
        .await
        .map_err(|err| OpenStackError::Transport {
            url: url.clone(),
            message: err.to_string(),
        })?;
    let response = expect_success(response).await?;

    let token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or(OpenStackError::MissingToken)?;
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|err| OpenStackError::Decode {
            url,
            message: err.to_string(),
        })?;
    Ok((token, body.token.catalog))
}

/// Picks the compute, image and network endpoints for `interface`,
/// restricted to `region` when one is given.
pub(super) fn select_endpoints(
    catalog: &[CatalogEntry],
    interface: &str,
    region: Option<&str>,
) -> Result<ServiceEndpoints, OpenStackError> {
    let compute = catalog_url(catalog, "compute", interface, region)?;
    let image = catalog_url(catalog, "image", interface, region)?;
    let network = catalog_url(catalog, "network", interface, region)?;
    Ok(ServiceEndpoints {
        compute: parse_url(compute)?,
        image: parse_url(&with_version(image, "v2"))?,
        network: parse_url(&with_version(network, "v2.0"))?,
    })
}

fn catalog_url<'a>(
    catalog: &'a [CatalogEntry],
    service: &str,
    interface: &str,
    region: Option<&str>,
) -> Result<&'a str, OpenStackError> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| endpoint.interface == interface && endpoint.in_region(region))
        .map(|endpoint| endpoint.url.as_str())
        .ok_or_else(|| OpenStackError::MissingService {
            service: service.to_owned(),
            interface: interface.to_owned(),
        })
}

/// Glance and Neutron publish unversioned catalog URLs.
fn with_version(url: &str, version: &str) -> String {
    let base = url.trim_end_matches('/');
    if base.ends_with(&format!("/{version}")) {
        base.to_owned()
    } else {
        format!("{base}/{version}")
    }
}

fn parse_url(raw: &str) -> Result<Url, OpenStackError> {
    Url::parse(raw.trim_end_matches('/')).map_err(|err| OpenStackError::InvalidUrl {
        url: raw.to_owned(),
        message: err.to_string(),
    })
}
