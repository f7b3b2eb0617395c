//! Configuration for the deployer.
//!
//! [`ProvisioningConfig`] is resolved from environment-style key/value pairs
//! on every invocation and never cached. [`ServerConfig`] is read once at
//! process start.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DeployError;

/// Environment keys the resolver recognises.
pub mod keys {
    pub const PROJECT_ID: &str = "G_CLOUD_PROJECT_ID";
    pub const ZONE: &str = "G_CLOUD_COMPUTE_ZONE";
    pub const REGION: &str = "G_CLOUD_REGION";
    pub const INSTANCE_NAME: &str = "G_CLOUD_COMPUTE_INSTANCE_NAME";
    pub const MACHINE_TYPE: &str = "G_CLOUD_COMPUTE_MACHINE_TYPE";
    pub const CONTAINER_IMAGE: &str = "G_CLOUD_COMPUTE_DOCKER_IMAGE_TO_DEPLOY";
    pub const SERVICE_ACCOUNT: &str = "G_CLOUD_COMPUTE_SERVICE_ACCOUNT";
    pub const SECRET_NAME: &str = "G_CLOUD_COMPUTE_SECRET_NAME";
    pub const PROD: &str = "PROD";
    pub const DATA_SOURCE_URL: &str = "DATA_SOURCE_URL";
    pub const DATA_DESTINATION_BUCKET: &str = "DATA_DESTINATION_BUCKET";

    /// Every recognised key, spelled exactly as it must appear.
    pub const ALL: [&str; 11] = [
        PROJECT_ID,
        ZONE,
        REGION,
        INSTANCE_NAME,
        MACHINE_TYPE,
        CONTAINER_IMAGE,
        SERVICE_ACCOUNT,
        SECRET_NAME,
        PROD,
        DATA_SOURCE_URL,
        DATA_DESTINATION_BUCKET,
    ];
}

/// Snapshot of the process environment. Variables that are not valid
/// unicode are skipped.
#[must_use]
pub fn process_vars() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Provisioning values for one invocation.
///
/// Every field defaults to empty so that absent and empty keys are treated
/// the same way by [`ProvisioningConfig::from_vars`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(rename = "g_cloud_project_id", default)]
    project_id: String,

    #[serde(rename = "g_cloud_compute_zone", default)]
    zone: String,

    #[serde(rename = "g_cloud_region", default)]
    region: String,

    #[serde(rename = "g_cloud_compute_instance_name", default)]
    instance_name: String,

    #[serde(rename = "g_cloud_compute_machine_type", default)]
    machine_type: String,

    #[serde(rename = "g_cloud_compute_docker_image_to_deploy", default)]
    container_image: String,

    /// Empty means "run as the project's default compute identity".
    #[serde(rename = "g_cloud_compute_service_account", default)]
    service_account_email: String,

    // Workload values below are passed through to the container verbatim,
    // empty or not.
    #[serde(rename = "prod", default)]
    prod: String,

    #[serde(rename = "g_cloud_compute_secret_name", default)]
    secret_name: String,

    #[serde(rename = "data_source_url", default)]
    data_source_url: String,

    #[serde(rename = "data_destination_bucket", default)]
    data_destination_bucket: String,
}

impl ProvisioningConfig {
    /// Resolve from an arbitrary set of key/value pairs.
    ///
    /// Keys are matched case-sensitively; anything not in [`keys::ALL`]
    /// is ignored. Fails with [`DeployError::MissingConfiguration`] naming
    /// the first required key that is absent or empty.
    pub fn from_vars<I>(vars: I) -> Result<Self, DeployError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // envy lowercases names before matching fields.
        let recognised = vars
            .into_iter()
            .filter(|(k, _)| keys::ALL.contains(&k.as_str()));
        let config: Self = envy::from_iter(recognised).map_err(|e| match e {
            envy::Error::MissingValue(field) => DeployError::MissingConfiguration {
                key: field.to_uppercase(),
            },
            other => DeployError::InvalidConfiguration(other.to_string()),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DeployError> {
        let required = [
            (keys::PROJECT_ID, &self.project_id),
            (keys::ZONE, &self.zone),
            (keys::REGION, &self.region),
            (keys::INSTANCE_NAME, &self.instance_name),
            (keys::MACHINE_TYPE, &self.machine_type),
            (keys::CONTAINER_IMAGE, &self.container_image),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((key, _)) => Err(DeployError::MissingConfiguration {
                key: (*key).to_string(),
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    #[must_use]
    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    #[must_use]
    pub fn container_image(&self) -> &str {
        &self.container_image
    }

    /// The service-account email, or `None` when the ambient default
    /// identity should be used.
    #[must_use]
    pub fn service_account_email(&self) -> Option<&str> {
        let email = self.service_account_email.trim();
        (!email.is_empty()).then_some(email)
    }

    #[must_use]
    pub fn prod(&self) -> &str {
        &self.prod
    }

    #[must_use]
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    #[must_use]
    pub fn data_source_url(&self) -> &str {
        &self.data_source_url
    }

    #[must_use]
    pub fn data_destination_bucket(&self) -> &str {
        &self.data_destination_bucket
    }
}

/// HTTP server and outbound client settings, loaded from `DEPLOYER_*`.
///
///   - `DEPLOYER_LISTEN_ADDR`          (default `0.0.0.0:8080`)
///   - `DEPLOYER_SUBMIT_TIMEOUT_SECS`  (default `60`)
///   - `DEPLOYER_COMPUTE_ENDPOINT`     (default `https://compute.googleapis.com/compute/v1`)
///   - `DEPLOYER_METADATA_ENDPOINT`    (default `http://metadata.google.internal`)
///   - `DEPLOYER_ACCESS_TOKEN`         (optional, skips the metadata server)
///
/// A plain `PORT` variable, as set by serverless runtimes, overrides the
/// port of the listen address.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,

    #[serde(default = "default_compute_endpoint")]
    pub compute_endpoint: String,

    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,

    pub access_token: Option<String>,
}

pub const SERVER_ENV_PREFIX: &str = "DEPLOYER_";

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_submit_timeout_secs() -> u64 {
    60
}

fn default_compute_endpoint() -> String {
    "https://compute.googleapis.com/compute/v1".to_string()
}

fn default_metadata_endpoint() -> String {
    "http://metadata.google.internal".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            submit_timeout_secs: default_submit_timeout_secs(),
            compute_endpoint: default_compute_endpoint(),
            metadata_endpoint: default_metadata_endpoint(),
            access_token: None,
        }
    }
}

impl ServerConfig {
    /// Load from `DEPLOYER_*` variables plus the `PORT` override.
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(process_vars())
    }

    /// Same as [`ServerConfig::from_env`] over an explicit variable set.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let mut config: Self = envy::prefixed(SERVER_ENV_PREFIX).from_iter(vars.iter().cloned())?;
        if let Some((_, port)) = vars.iter().find(|(k, _)| k == "PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| envy::Error::Custom(format!("invalid PORT {port:?}: {e}")))?;
            config.listen_addr.set_port(port);
        }
        if config.submit_timeout_secs == 0 {
            return Err(envy::Error::Custom(format!(
                "{SERVER_ENV_PREFIX}SUBMIT_TIMEOUT_SECS must be at least 1"
            )));
        }
        Ok(config)
    }

    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}
