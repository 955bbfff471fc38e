//! Endpoint parameter mapping.
//!
//! Parameters arrive as a flat key/value map supplied once when the endpoint
//! is constructed. The creator mutates the map per instance with generated
//! identifiers (`VMUUID`, `VMType`) so that the user-data builder can embed
//! them in the boot payload.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named cloud profile used to open the provider session.
pub const OS_CLOUD: &str = "OSCloud";
/// Provider identifier of the boot image.
pub const IMAGE_ID: &str = "ImageID";
/// Human readable name of the boot image.
pub const IMAGE_NAME: &str = "ImageName";
/// Flavor name or identifier. Required.
pub const FLAVOR_NAME: &str = "FlavorName";
/// Keypair injected into the instance.
pub const KEY_NAME: &str = "KeyName";
/// Private network the server is attached to.
pub const NETWORK_NAME: &str = "NetworkName";
/// External network used to allocate a floating IP.
pub const PUBLIC_NETWORK: &str = "PublicNetwork";
/// Computing element type reported back as `VMType`.
pub const CE_TYPE: &str = "CEType";
/// Short identifier of the instance being created.
pub const VM_UUID: &str = "VMUUID";
/// Type of the instance being created.
pub const VM_TYPE: &str = "VMType";

/// `VMType` value used when no `CEType` is configured.
pub const DEFAULT_VM_TYPE: &str = "OpenStack";

/// A single parameter value: either free text or a number.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Numeric value (for example a disk size override).
    Number(serde_json::Number),
    /// Text value.
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for ParameterValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

/// Errors raised while parsing parameters from text.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParameterError {
    /// Raised when an assignment is not of the form `KEY=VALUE`.
    #[error("expected KEY=VALUE, got `{0}`")]
    MalformedAssignment(String),
    /// Raised when the key of an assignment is blank.
    #[error("parameter key must not be empty")]
    EmptyKey,
}

/// Ordered mapping from parameter key to value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EndpointParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl EndpointParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, consuming and returning the set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    /// Returns the value under `key` rendered as text.
    ///
    /// Blank text values are treated as absent, matching how lookups treat a
    /// key that was never configured.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        let rendered = self.values.get(key)?.to_string();
        if rendered.trim().is_empty() {
            None
        } else {
            Some(rendered)
        }
    }

    /// Returns `true` when `key` holds a non-blank value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.text(key).is_some()
    }

    /// Iterates over all parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for EndpointParameters
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

/// A single `KEY=VALUE` assignment as accepted on the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterAssignment {
    /// Parameter key.
    pub key: String,
    /// Parameter value as typed by the user.
    pub value: String,
}

impl FromStr for ParameterAssignment {
    type Err = ParameterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| ParameterError::MalformedAssignment(raw.to_owned()))?;
        let trimmed_key = key.trim();
        if trimmed_key.is_empty() {
            return Err(ParameterError::EmptyKey);
        }
        Ok(Self {
            key: trimmed_key.to_owned(),
            value: value.to_owned(),
        })
    }
}

impl FromIterator<ParameterAssignment> for EndpointParameters {
    fn from_iter<T: IntoIterator<Item = ParameterAssignment>>(iter: T) -> Self {
        iter.into_iter()
            .map(|assignment| (assignment.key, assignment.value))
            .collect()
    }
}
