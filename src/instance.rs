//! Identifiers and result records for created instances.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Flavor;

const INSTANCE_ID_LEN: usize = 8;

/// Locally generated short identifier for an instance.
///
/// The identifier is embedded in the server name and user-data so the
/// caller can correlate a provider server with its own bookkeeping. It is
/// distinct from the provider assigned server id.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates a fresh 8 character identifier from a random UUID.
    #[must_use]
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple.chars().take(INSTANCE_ID_LEN).collect())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Properties of a created instance reported back to the caller.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceDescriptor {
    /// Floating IP attached to the instance, when one was requested.
    #[serde(rename = "PublicIP", default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Locally generated instance identifier.
    #[serde(rename = "InstanceID")]
    pub instance_id: InstanceId,
    /// Virtual CPU count taken from the flavor.
    #[serde(rename = "NumberOfCPUs")]
    pub number_of_cpus: u32,
    /// Memory from the flavor, in the provider's unit (usually MiB).
    #[serde(rename = "RAM")]
    pub ram: u64,
    /// Root disk size from the flavor, in the provider's unit.
    #[serde(rename = "DiskSize")]
    pub disk_size: u64,
}

impl InstanceDescriptor {
    pub(crate) fn new(instance_id: InstanceId, flavor: &Flavor, public_ip: Option<String>) -> Self {
        Self {
            public_ip,
            instance_id,
            number_of_cpus: flavor.vcpus,
            ram: flavor.ram,
            disk_size: flavor.disk,
        }
    }
}

/// Result of a successful instance creation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceRecord {
    /// Provider assigned server identifier, used later to stop the instance.
    pub server_id: String,
    /// Instance properties.
    pub descriptor: InstanceDescriptor,
}
