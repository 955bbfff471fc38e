//! Shared fixtures for lifecycle BDD scenarios.

use std::time::Duration;

use nimbus::parameters::{FLAVOR_NAME, IMAGE_NAME, OS_CLOUD};
use nimbus::test_support::{FakeConnector, FakeProvider};
use nimbus::{
    BatchOutcome, Endpoint, EndpointError, EndpointParameters, EndpointSettings, TemplateUserData,
};
use rstest::fixture;

use crate::test_constants::{STOCKED_FLAVOR, STOCKED_IMAGE, TEST_CLOUD};

pub type LifecycleEndpoint = Endpoint<FakeProvider, TemplateUserData>;

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub provider: FakeProvider,
    pub parameters: EndpointParameters,
    pub outcome: Option<BatchOutcome>,
    pub stop_result: Option<Result<(), EndpointError>>,
}

impl LifecycleContext {
    /// Connects a fresh endpoint to the shared in-memory provider.
    pub async fn connect(&self) -> LifecycleEndpoint {
        Endpoint::with_settings(
            self.parameters.clone(),
            &FakeConnector::new(self.provider.clone()),
            TemplateUserData::new("#!/bin/sh\necho ${VMUUID}\n"),
            EndpointSettings::default()
                .with_wait_timeout(Duration::from_millis(100))
                .with_poll_interval(Duration::from_millis(1)),
        )
        .await
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        provider: FakeProvider::stocked(),
        parameters: EndpointParameters::new()
            .with(OS_CLOUD, TEST_CLOUD)
            .with(IMAGE_NAME, STOCKED_IMAGE)
            .with(FLAVOR_NAME, STOCKED_FLAVOR),
        outcome: None,
        stop_result: None,
    }
}
