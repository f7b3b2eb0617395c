//! Typed error taxonomy for a single provisioning invocation.
//!
//! Every variant is terminal for the invocation that raised it. Nothing in
//! this crate retries; the caller (scheduler or operator) owns retry policy.

use thiserror::Error;

/// Errors raised while resolving, building, or submitting an instance.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A required configuration key is absent or empty.
    #[error("missing configuration: {key}")]
    MissingConfiguration { key: String },

    /// The configuration source could not be read at all.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The instance descriptor could not be assembled.
    #[error("building instance descriptor: {0}")]
    DescriptorConstruction(String),

    /// The provisioning API was unreachable or rejected the request.
    #[error("{}", provisioning_message(.status.as_ref().copied(), .reason.as_deref(), .detail))]
    ProvisioningFailed {
        /// HTTP status returned by the provider, if a response was received.
        status: Option<u16>,
        /// Provider reason code, e.g. `alreadyExists` or `quotaExceeded`.
        reason: Option<String>,
        /// Provider error message or transport error text.
        detail: String,
    },
}

impl DeployError {
    /// Shorthand for a transport-level failure with no provider response.
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::ProvisioningFailed {
            status: None,
            reason: None,
            detail: detail.into(),
        }
    }

    /// Whether the provider rejected the insert because an instance with
    /// the same name already exists in the zone.
    ///
    /// Collisions stay in the `ProvisioningFailed` bucket; this only lets
    /// the handler log a more useful hint.
    #[must_use]
    pub fn is_name_collision(&self) -> bool {
        match self {
            Self::ProvisioningFailed { status, reason, .. } => {
                reason.as_deref() == Some("alreadyExists")
                    || (reason.is_none() && *status == Some(409))
            }
            _ => false,
        }
    }
}

fn provisioning_message(status: Option<u16>, reason: Option<&str>, detail: &str) -> String {
    match (status, reason) {
        (Some(code), Some(reason)) => format!("provisioning failed ({code} {reason}): {detail}"),
        (Some(code), None) => format!("provisioning failed ({code}): {detail}"),
        (None, _) => format!("provisioning failed: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configuration_names_the_key() {
        let err = DeployError::MissingConfiguration {
            key: "G_CLOUD_COMPUTE_ZONE".to_string(),
        };
        assert_eq!(err.to_string(), "missing configuration: G_CLOUD_COMPUTE_ZONE");
    }

    #[test]
    fn provisioning_failed_includes_status_and_reason() {
        let err = DeployError::ProvisioningFailed {
            status: Some(403),
            reason: Some("quotaExceeded".to_string()),
            detail: "Quota 'CPUS' exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "provisioning failed (403 quotaExceeded): Quota 'CPUS' exceeded"
        );
    }

    #[test]
    fn transport_failure_has_no_status() {
        let err = DeployError::transport("connection refused");
        assert_eq!(err.to_string(), "provisioning failed: connection refused");
        assert!(!err.is_name_collision());
    }

    #[test]
    fn already_exists_reason_is_a_collision() {
        let err = DeployError::ProvisioningFailed {
            status: Some(409),
            reason: Some("alreadyExists".to_string()),
            detail: "The resource already exists".to_string(),
        };
        assert!(err.is_name_collision());
    }

    #[test]
    fn bare_conflict_status_is_a_collision() {
        let err = DeployError::ProvisioningFailed {
            status: Some(409),
            reason: None,
            detail: String::new(),
        };
        assert!(err.is_name_collision());
    }

    #[test]
    fn other_reasons_are_not_collisions() {
        let err = DeployError::ProvisioningFailed {
            status: Some(409),
            reason: Some("resourceInUseByAnotherResource".to_string()),
            detail: String::new(),
        };
        assert!(!err.is_name_collision());
    }
}
