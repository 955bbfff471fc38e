//! BDD step definitions for creating and stopping instances.

use nimbus::EndpointError;
use nimbus::parameters::PUBLIC_NETWORK;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::LifecycleContext;
use crate::test_constants::STOCKED_PUBLIC_NETWORK;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

#[given("a connected endpoint")]
fn connected_endpoint(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
}

#[given("server creation fails on attempt \"{attempt}\"")]
fn creation_fails_on(lifecycle_context: LifecycleContext, attempt: u32) -> LifecycleContext {
    lifecycle_context.provider.fail_create_server_on(attempt);
    lifecycle_context
}

#[given("the public network is configured")]
fn public_network_configured(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
        .parameters
        .set(PUBLIC_NETWORK, STOCKED_PUBLIC_NETWORK);
    lifecycle_context
}

#[given("a running server \"{id}\"")]
fn running_server(lifecycle_context: LifecycleContext, id: String) -> LifecycleContext {
    lifecycle_context
        .provider
        .add_server(&id, &format!("nimbus_{id}"));
    lifecycle_context
}

#[when("I create \"{count}\" instances")]
fn create_instances(
    mut lifecycle_context: LifecycleContext,
    count: usize,
) -> Result<LifecycleContext, StepError> {
    let runtime = runtime()?;
    let context = lifecycle_context.clone();
    let outcome = runtime
        .block_on(async move {
            let mut endpoint = context.connect().await;
            endpoint.create_instances(count).await
        })
        .map_err(|err| StepError::Assertion(format!("batch call should succeed: {err}")))?;
    lifecycle_context.outcome = Some(outcome);
    Ok(lifecycle_context)
}

#[when("I stop every created instance")]
fn stop_created(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let outcome = lifecycle_context
        .outcome
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no instances were created")))?;
    let runtime = runtime()?;
    let context = lifecycle_context.clone();
    let result = runtime.block_on(async move {
        let endpoint = context.connect().await;
        for (server_id, descriptor) in &outcome.created {
            endpoint
                .stop_vm(server_id, descriptor.public_ip.as_deref())
                .await?;
        }
        Ok::<(), EndpointError>(())
    });
    lifecycle_context.stop_result = Some(result);
    Ok(lifecycle_context)
}

#[when("I stop server \"{id}\" with public IP \"{address}\"")]
fn stop_server_with_ip(
    mut lifecycle_context: LifecycleContext,
    id: String,
    address: String,
) -> Result<LifecycleContext, StepError> {
    let runtime = runtime()?;
    let context = lifecycle_context.clone();
    let result = runtime.block_on(async move {
        let endpoint = context.connect().await;
        endpoint.stop_vm(&id, Some(&address)).await
    });
    lifecycle_context.stop_result = Some(result);
    Ok(lifecycle_context)
}

#[then("\"{count}\" instances are reported as created")]
fn instances_created(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let created = lifecycle_context
        .outcome
        .as_ref()
        .map_or(0, |outcome| outcome.created.len());
    if created == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} created instances, got {created}"
        )))
    }
}

#[then("the batch failure is reported for attempt \"{attempt}\"")]
fn batch_failure_attempt(
    lifecycle_context: &LifecycleContext,
    attempt: usize,
) -> Result<(), StepError> {
    let failure = lifecycle_context
        .outcome
        .as_ref()
        .and_then(|outcome| outcome.failure.as_ref())
        .ok_or_else(|| StepError::Assertion(String::from("expected a batch failure")))?;
    if failure.attempt == attempt && failure.error.is_retryable() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected retryable failure on attempt {attempt}, got {failure:?}"
        )))
    }
}

#[then("every created instance has a public IP")]
fn every_instance_public(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let outcome = lifecycle_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing batch outcome")))?;
    let missing: Vec<&String> = outcome
        .created
        .iter()
        .filter(|(_, descriptor)| descriptor.public_ip.is_none())
        .map(|(server_id, _)| server_id)
        .collect();
    if missing.is_empty() && lifecycle_context.provider.floating_ip_count() == outcome.created.len()
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "instances without public IP: {missing:?}"
        )))
    }
}

#[then("the stop succeeds")]
fn stop_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.stop_result {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected stop to succeed, got: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing stop result"))),
    }
}

#[then("the stop fails because the floating IP is not found")]
fn stop_fails_not_found(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.stop_result {
        Some(Err(EndpointError::NotFound { resource, .. })) if resource == "floating IP" => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected floating IP not found, got {other:?}"
        ))),
    }
}

#[then("\"{count}\" servers remain in the project")]
fn servers_remain(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let remaining = lifecycle_context.provider.servers().len();
    if remaining == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} servers, found {remaining}"
        )))
    }
}

#[then("no servers remain in the project")]
fn no_servers_remain(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    servers_remain(lifecycle_context, 0)
}

#[then("no floating IPs remain in the project")]
fn no_floating_ips_remain(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle_context.provider.floating_ip_count() {
        0 => Ok(()),
        remaining => Err(StepError::Assertion(format!(
            "expected no floating IPs, found {remaining}"
        ))),
    }
}
