//! Instance descriptor builder.
//!
//! Pure translation from a resolved [`ProvisioningConfig`] to the
//! [`Instance`] request body. No I/O happens here; the only side effect is
//! diagnostic logging.

use std::collections::BTreeMap;

use crate::config::ProvisioningConfig;
use crate::container::ContainerDeclaration;
use crate::error::DeployError;
use crate::types::{
    AccessConfig, AttachedDisk, DiskInitializeParams, Instance, Metadata, MetadataItem,
    NetworkInterface, Scheduling, ServiceAccount,
};

/// Container-Optimized OS release the worker boots from.
pub const COS_IMAGE_VERSION: &str = "cos-stable-109-17800-147-38";

pub const SOURCE_IMAGE: &str = "projects/cos-cloud/global/images/cos-stable-109-17800-147-38";
pub const BOOT_DISK_NAME: &str = "worker-instance-boot-disk";
pub const BOOT_DISK_SIZE_GB: u64 = 10;
pub const BOOT_DISK_TYPE: &str = "pd-standard";

pub const CONTAINER_DECLARATION_KEY: &str = "gce-container-declaration";
pub const LOGGING_ENABLED_KEY: &str = "google-logging-enabled";

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Provenance labels used for fleet auditing.
pub const LABELS: [(&str, &str); 2] = [
    ("goog-ec-src", "vm_add-rest"),
    ("container-vm", COS_IMAGE_VERSION),
];

/// `zones/{zone}/machineTypes/{machine_type}`
#[must_use]
pub fn machine_type_path(zone: &str, machine_type: &str) -> String {
    format!("zones/{zone}/machineTypes/{machine_type}")
}

/// `projects/{project}/regions/{region}/subnetworks/default`
#[must_use]
pub fn default_subnetwork_path(project_id: &str, region: &str) -> String {
    format!("projects/{project_id}/regions/{region}/subnetworks/default")
}

/// Build the full instance descriptor for one invocation.
pub fn build_instance(config: &ProvisioningConfig) -> Result<Instance, DeployError> {
    tracing::info!(
        instance_name = config.instance_name(),
        zone = config.zone(),
        machine_type = config.machine_type(),
        "building instance descriptor"
    );

    let instance = Instance {
        name: config.instance_name().to_string(),
        machine_type: machine_type_path(config.zone(), config.machine_type()),
        network_interfaces: network_interfaces(config),
        scheduling: scheduling(),
        disks: attached_disks(config),
        metadata: metadata(config)?,
        labels: LABELS
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
        service_accounts: service_accounts(config),
    };

    tracing::debug!(
        service_account = instance.service_accounts.first().map(|sa| sa.email.as_str()),
        "instance descriptor built"
    );
    Ok(instance)
}

fn network_interfaces(config: &ProvisioningConfig) -> Vec<NetworkInterface> {
    tracing::debug!(
        project_id = config.project_id(),
        region = config.region(),
        "network interface"
    );
    vec![NetworkInterface {
        name: "default".to_string(),
        subnetwork: default_subnetwork_path(config.project_id(), config.region()),
        access_configs: vec![AccessConfig {
            name: "External NAT".to_string(),
            kind: "ONE_TO_ONE_NAT".to_string(),
            network_tier: "PREMIUM".to_string(),
        }],
    }]
}

// Preemptible instances must not restart automatically and must terminate
// on host maintenance.
fn scheduling() -> Scheduling {
    Scheduling {
        preemptible: true,
        automatic_restart: false,
        on_host_maintenance: "TERMINATE".to_string(),
    }
}

fn attached_disks(config: &ProvisioningConfig) -> Vec<AttachedDisk> {
    vec![AttachedDisk {
        boot: true,
        auto_delete: true,
        mode: "READ_WRITE".to_string(),
        interface: "SCSI".to_string(),
        initialize_params: DiskInitializeParams {
            disk_name: BOOT_DISK_NAME.to_string(),
            disk_type: format!(
                "projects/{}/zones/{}/diskTypes/{BOOT_DISK_TYPE}",
                config.project_id(),
                config.zone()
            ),
            source_image: SOURCE_IMAGE.to_string(),
            disk_size_gb: BOOT_DISK_SIZE_GB,
        },
    }]
}

fn metadata(config: &ProvisioningConfig) -> Result<Metadata, DeployError> {
    let declaration = ContainerDeclaration::for_worker(config).render()?;
    tracing::debug!(%declaration, "rendered container declaration");
    Ok(Metadata {
        items: vec![
            MetadataItem {
                key: CONTAINER_DECLARATION_KEY.to_string(),
                value: declaration,
            },
            MetadataItem {
                key: LOGGING_ENABLED_KEY.to_string(),
                value: "true".to_string(),
            },
        ],
    })
}

fn service_accounts(config: &ProvisioningConfig) -> Vec<ServiceAccount> {
    config
        .service_account_email()
        .map(|email| ServiceAccount {
            email: email.to_string(),
            scopes: vec![CLOUD_PLATFORM_SCOPE.to_string()],
        })
        .into_iter()
        .collect()
}
