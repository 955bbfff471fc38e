//! Error types for the OpenStack provider.

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;

/// Errors raised by the OpenStack provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OpenStackError {
    /// Raised when a cloud profile fails validation.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when `connect` names a profile the connector does not hold.
    #[error("no cloud profile named {0}")]
    UnknownProfile(String),
    /// Raised when a request cannot be sent or its response not read.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Error reported by the HTTP client.
        message: String,
    },
    /// Raised when an API answers with a non-success status.
    #[error("{url} returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Target URL.
        url: String,
        /// Message extracted from the response body.
        message: String,
    },
    /// Raised when a response body does not have the expected shape.
    #[error("could not decode response from {url}: {message}")]
    Decode {
        /// Target URL.
        url: String,
        /// Deserialisation error.
        message: String,
    },
    /// Raised when Keystone accepts the credentials but returns no token.
    #[error("identity service returned no X-Subject-Token header")]
    MissingToken,
    /// Raised when the service catalog lacks a required service.
    #[error("service catalog has no {interface} endpoint for {service}")]
    MissingService {
        /// Catalog service type (`compute`, `image`, `network`).
        service: String,
        /// Requested interface.
        interface: String,
    },
    /// Raised when a catalog or configured URL cannot be parsed.
    #[error("invalid endpoint URL {url}: {message}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parser error.
        message: String,
    },
    /// Raised when a name lookup matches more than one resource.
    #[error("{count} {resource} resources are named {name}")]
    Ambiguous {
        /// Kind of resource looked up.
        resource: String,
        /// Name used for the lookup.
        name: String,
        /// Number of matches.
        count: usize,
    },
    /// Raised when a server enters the `ERROR` state while building.
    #[error("server {id} entered status {status}")]
    ServerFault {
        /// Server identifier.
        id: String,
        /// Reported status.
        status: String,
    },
    /// Raised when a server disappears while it is awaited.
    #[error("server {id} disappeared while building")]
    ServerGone {
        /// Server identifier.
        id: String,
    },
}

impl From<ConfigError> for OpenStackError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl ProviderError for OpenStackError {
    fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}
