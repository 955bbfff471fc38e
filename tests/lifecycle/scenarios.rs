//! BDD scenarios for the instance lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop a batch at the first failed creation"
)]
fn scenario_partial_batch(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Attach a floating IP from the public network"
)]
fn scenario_public_ip(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stopping an instance releases its address"
)]
fn scenario_stop_releases_address(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Unknown floating IP leaves the server running"
)]
fn scenario_unknown_floating_ip(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
