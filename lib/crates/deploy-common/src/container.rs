//! Container launch declaration read by Container-Optimized OS at boot.
//!
//! The declaration is rendered with `serde_yaml` rather than string
//! templating, so configuration values are always emitted as YAML scalars.

use serde::{Deserialize, Serialize};

use crate::config::{ProvisioningConfig, keys};
use crate::error::DeployError;

/// Name of the single container the worker instance runs.
pub const CONTAINER_NAME: &str = "travel-assistant";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDeclaration {
    pub spec: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub containers: Vec<Container>,
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    pub stdin: bool,
    pub tty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Restart policy for the container; the batch job runs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

impl ContainerDeclaration {
    /// Declaration for the fuel-price worker, with the workload environment
    /// taken from `config`. Empty values are passed through as empty strings.
    #[must_use]
    pub fn for_worker(config: &ProvisioningConfig) -> Self {
        let env = [
            (keys::PROD, config.prod()),
            (keys::PROJECT_ID, config.project_id()),
            (keys::INSTANCE_NAME, config.instance_name()),
            (keys::SECRET_NAME, config.secret_name()),
            (keys::DATA_SOURCE_URL, config.data_source_url()),
            (keys::DATA_DESTINATION_BUCKET, config.data_destination_bucket()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect();

        Self {
            spec: ContainerSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: config.container_image().to_string(),
                    env,
                    stdin: false,
                    tty: false,
                }],
                restart_policy: RestartPolicy::Never,
            },
        }
    }

    /// Render as the YAML document stored in instance metadata.
    pub fn render(&self) -> Result<String, DeployError> {
        serde_yaml::to_string(self).map_err(|e| DeployError::DescriptorConstruction(e.to_string()))
    }

    /// Parse a rendered declaration back.
    pub fn parse(text: &str) -> Result<Self, DeployError> {
        serde_yaml::from_str(text).map_err(|e| DeployError::DescriptorConstruction(e.to_string()))
    }

    /// Value of an environment variable on the first container.
    #[must_use]
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.spec
            .containers
            .first()?
            .env
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.value.as_str())
    }
}
