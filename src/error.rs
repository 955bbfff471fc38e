//! Error types for endpoint operations.

use std::fmt::Display;

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors raised by endpoint operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EndpointError {
    /// Raised when a parameter is missing or unusable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Raised when a named provider resource does not exist.
    #[error("{resource} {name} not found")]
    NotFound {
        /// Kind of resource that was looked up.
        resource: String,
        /// Identifier or name used for the lookup.
        name: String,
    },
    /// Raised when a name matches more than one provider resource.
    #[error("{resource} {name} is ambiguous: {message}")]
    Ambiguous {
        /// Kind of resource that was looked up.
        resource: String,
        /// Name used for the lookup.
        name: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Wrapper for failures raised by the provider while performing an operation.
    #[error("{operation} failed: {message}")]
    ProviderFailure {
        /// Step that failed, including the affected identifier.
        operation: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the provider session cannot be established or checked.
    #[error("can't connect to cloud: {0}")]
    Connection(String),
    /// Raised when an operation is attempted on an endpoint without a session.
    #[error("endpoint has no valid provider connection")]
    NotConnected,
    /// Raised when waiting on the provider exceeds the configured timeout.
    #[error("timeout waiting for {action} on {id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Provider or local identifier of the affected resource.
        id: String,
    },
    /// Raised when the user-data payload cannot be built.
    #[error("user-data error: {0}")]
    UserData(String),
}

impl EndpointError {
    pub(crate) fn not_found(resource: &str, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.to_owned(),
            name: name.into(),
        }
    }

    /// Maps a failed lookup of `resource` by `name`. Ambiguous matches keep
    /// their own variant; anything else is a provider failure of `operation`.
    pub(crate) fn lookup<E: ProviderError>(
        operation: impl Into<String>,
        resource: &str,
        name: &str,
        err: &E,
    ) -> Self {
        if err.is_ambiguous() {
            return Self::Ambiguous {
                resource: resource.to_owned(),
                name: name.to_owned(),
                message: err.to_string(),
            };
        }
        Self::provider(operation, err)
    }

    pub(crate) fn provider(operation: impl Into<String>, err: &impl Display) -> Self {
        Self::ProviderFailure {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Returns `true` for infrastructure failures that may succeed on retry.
    ///
    /// Configuration errors (missing parameters, unknown or ambiguous
    /// resources, bad user-data) are permanent and return `false`.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderFailure { .. } | Self::Connection(_) | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EndpointError::InvalidParameter(String::from("no flavor specified")), false)]
    #[case(EndpointError::not_found("flavor", "m1.huge"), false)]
    #[case(
        EndpointError::Ambiguous {
            resource: String::from("image"),
            name: String::from("ubuntu"),
            message: String::from("2 image resources are named ubuntu"),
        },
        false
    )]
    #[case(EndpointError::UserData(String::from("empty")), false)]
    #[case(EndpointError::NotConnected, false)]
    #[case(EndpointError::Connection(String::from("refused")), true)]
    #[case(
        EndpointError::Timeout { action: String::from("server active"), id: String::from("srv") },
        true
    )]
    #[case(EndpointError::provider("create server", &"quota exceeded"), true)]
    fn classifies_retryable_errors(#[case] error: EndpointError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[rstest]
    fn provider_failure_message_names_step_and_cause() {
        let error = EndpointError::provider("terminate instance srv-1", &"HTTP 500");
        assert_eq!(error.to_string(), "terminate instance srv-1 failed: HTTP 500");
    }

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupFailure {
        ambiguous: bool,
    }

    impl ProviderError for LookupFailure {
        fn is_ambiguous(&self) -> bool {
            self.ambiguous
        }
    }

    #[rstest]
    fn ambiguous_lookups_are_not_retryable() {
        let error = EndpointError::lookup(
            "find image ubuntu",
            "image",
            "ubuntu",
            &LookupFailure { ambiguous: true },
        );
        assert_eq!(
            error,
            EndpointError::Ambiguous {
                resource: String::from("image"),
                name: String::from("ubuntu"),
                message: String::from("lookup failed"),
            }
        );
        assert!(!error.is_retryable());
    }

    #[rstest]
    fn other_lookup_failures_stay_retryable() {
        let error = EndpointError::lookup(
            "find image ubuntu",
            "image",
            "ubuntu",
            &LookupFailure { ambiguous: false },
        );
        assert_eq!(error.to_string(), "find image ubuntu failed: lookup failed");
        assert!(error.is_retryable());
    }

    #[rstest]
    fn not_found_message_names_resource() {
        let error = EndpointError::not_found("keypair", "ops");
        assert_eq!(error.to_string(), "keypair ops not found");
    }
}
