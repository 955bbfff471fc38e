//! Sequential batch creation.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::error::EndpointError;
use crate::instance::{InstanceDescriptor, InstanceId};
use crate::provider::Provider;
use crate::user_data::UserDataBuilder;

use super::Endpoint;

/// The attempt that stopped a batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchFailure {
    /// 1-based position of the failed attempt within the batch.
    pub attempt: usize,
    /// Identifier generated for the failed attempt.
    pub instance_id: InstanceId,
    /// Why the attempt failed.
    pub error: EndpointError,
}

/// Result of a batch creation.
///
/// A batch stops at its first failure but is still reported as a success of
/// the batch call itself; `failure` tells the caller whether the batch was cut
/// short and why.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchOutcome {
    /// Number of instances requested.
    pub requested: usize,
    /// Created instances keyed by provider server id.
    pub created: BTreeMap<String, InstanceDescriptor>,
    /// The attempt that stopped the batch, if any.
    pub failure: Option<BatchFailure>,
}

impl BatchOutcome {
    /// Returns `true` when every requested instance was created.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.created.len() == self.requested
    }
}

impl<P, U> Endpoint<P, U>
where
    P: Provider,
    U: UserDataBuilder,
{
    /// Creates up to `count` instances one after another.
    ///
    /// The first failed attempt is logged and ends the batch. Instances
    /// already created stay up; they are returned in
    /// [`BatchOutcome::created`] for the caller to keep or stop.
    ///
    /// # Errors
    ///
    /// Never fails at the batch level. Per-instance failures are reported in
    /// [`BatchOutcome::failure`].
    pub async fn create_instances(&mut self, count: usize) -> Result<BatchOutcome, EndpointError> {
        let mut outcome = BatchOutcome {
            requested: count,
            ..BatchOutcome::default()
        };

        for attempt in 1..=count {
            debug!(attempt, count, "creating VM");
            let instance_id = InstanceId::generate();
            match self.create_instance(Some(instance_id.clone())).await {
                Ok(record) => {
                    debug!(
                        server_id = %record.server_id,
                        instance_id = %instance_id,
                        "created VM instance"
                    );
                    outcome.created.insert(record.server_id, record.descriptor);
                }
                Err(err) => {
                    error!(
                        attempt,
                        count,
                        instance_id = %instance_id,
                        error = %err,
                        "create instance error"
                    );
                    outcome.failure = Some(BatchFailure {
                        attempt,
                        instance_id,
                        error: err,
                    });
                    break;
                }
            }
        }

        Ok(outcome)
    }
}
