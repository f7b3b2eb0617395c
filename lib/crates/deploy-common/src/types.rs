//! Wire types for the compute provisioning API.
//!
//! Field names follow the provider's camelCase JSON. Only the subset of the
//! `Instance` resource the deployer fills in is modelled; unset optional
//! fields are left out of the request body entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Request body for `instances.insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,

    /// Partial resource path, `zones/{zone}/machineTypes/{type}`.
    pub machine_type: String,

    pub network_interfaces: Vec<NetworkInterface>,

    pub scheduling: Scheduling,

    pub disks: Vec<AttachedDisk>,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Omitted when the instance should run as the default identity; the
    /// provider rejects an entry with an empty email.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    pub subnetwork: String,
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub network_tier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub preemptible: bool,
    pub automatic_restart: bool,
    pub on_host_maintenance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    pub boot: bool,
    pub auto_delete: bool,
    pub mode: String,
    pub interface: String,
    pub initialize_params: DiskInitializeParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInitializeParams {
    pub disk_name: String,
    pub disk_type: String,
    pub source_image: String,
    pub disk_size_gb: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub items: Vec<MetadataItem>,
}

impl Metadata {
    /// Look up a metadata value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// Handle returned by the provider once an insert has been accepted.
///
/// Acceptance only; the instance may still be booting or may later fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub operation_type: String,
    pub status: String,
    pub target_link: String,
    pub zone: String,
    pub self_link: String,
}

/// Error envelope returned by the provider on rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiError,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorDetail {
    pub reason: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tolerates_missing_fields() {
        let op: Operation = serde_json::from_str(
            r#"{"kind":"compute#operation","id":"123","name":"operation-1","status":"RUNNING"}"#,
        )
        .unwrap();
        assert_eq!(op.name, "operation-1");
        assert_eq!(op.status, "RUNNING");
        assert!(op.target_link.is_empty());
    }

    #[test]
    fn api_error_reads_reason() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":{"code":409,"message":"already exists",
                "errors":[{"domain":"global","reason":"alreadyExists","message":"already exists"}]}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code, 409);
        assert_eq!(body.error.errors[0].reason, "alreadyExists");
    }

    #[test]
    fn metadata_lookup() {
        let md = Metadata {
            items: vec![MetadataItem {
                key: "google-logging-enabled".to_string(),
                value: "true".to_string(),
            }],
        };
        assert_eq!(md.get("google-logging-enabled"), Some("true"));
        assert_eq!(md.get("startup-script"), None);
    }
}
