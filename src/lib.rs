//! Core library for the Nimbus cloud endpoint adapter.
//!
//! An [`Endpoint`] wraps one cloud provider session and turns a flat set of
//! string parameters into running instances: it resolves images, flavors,
//! keypairs and networks, passes templated user-data, waits for the server
//! to become active and attaches a floating IP when a public network is
//! configured. Instances are stopped by releasing their floating IP and
//! deleting the server.
//!
//! The endpoint is generic over the [`Provider`] capability interface.
//! [`OpenStackConnector`] supplies the OpenStack implementation; the
//! [`test_support`] module supplies an in-memory double.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod instance;
pub mod openstack;
pub mod parameters;
pub mod provider;
pub mod resolver;
pub mod test_support;
pub mod user_data;

pub use config::{ConfigError, OpenStackConfig};
pub use endpoint::{BatchFailure, BatchOutcome, CreationStage, Endpoint, EndpointSettings};
pub use error::EndpointError;
pub use instance::{InstanceDescriptor, InstanceId, InstanceRecord};
pub use openstack::{OpenStackConnector, OpenStackError, OpenStackSession};
pub use parameters::{EndpointParameters, ParameterAssignment, ParameterError, ParameterValue};
pub use provider::{Connector, Provider, ProviderError, ProviderFuture};
pub use resolver::{ResolvedResources, ResourceResolver};
pub use user_data::{TemplateUserData, UserDataBuilder, UserDataError};
