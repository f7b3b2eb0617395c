//! Submission client for the compute provisioning API.
//!
//! [`ComputeApi`] is the port the handler depends on. [`GceComputeClient`]
//! is the production adapter: it calls `instances.insert` over REST with a
//! bearer token taken from the ambient identity of the host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use fuel_deploy_common::types::ApiErrorBody;
use fuel_deploy_common::{DeployError, Instance, Operation, ServerConfig};

const TOKEN_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/token";

/// Remote provisioning operations used by the handler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Submit an insert request and return the provider's operation handle.
    ///
    /// Resolves once the provider has accepted the request, not once the
    /// instance is running.
    async fn insert_instance(
        &self,
        project_id: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, DeployError>;
}

/// Where the bearer token for API calls comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A pre-issued token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The instance metadata server of the execution environment.
    MetadataServer { endpoint: String },
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// REST adapter for the Compute Engine `instances.insert` call.
#[derive(Debug, Clone)]
pub struct GceComputeClient {
    http: reqwest::Client,
    endpoint: String,
    token: TokenSource,
}

impl GceComputeClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        token: TokenSource,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, DeployError> {
        let token = match config.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => TokenSource::Static(token.to_string()),
            _ => TokenSource::MetadataServer {
                endpoint: config.metadata_endpoint.clone(),
            },
        };
        Self::new(config.compute_endpoint.clone(), token, config.submit_timeout())
    }

    async fn access_token(&self) -> Result<String, DeployError> {
        let endpoint = match &self.token {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::MetadataServer { endpoint } => endpoint,
        };
        let url = format!("{}/{TOKEN_PATH}", endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("fetching access token: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::ProvisioningFailed {
                status: Some(status.as_u16()),
                reason: Some("unauthenticated".to_string()),
                detail: format!("metadata server refused token request ({status})"),
            });
        }
        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| DeployError::transport(format!("decoding access token: {e}")))?;
        Ok(token.access_token)
    }

    fn insert_url(&self, project_id: &str, zone: &str) -> Result<Url, DeployError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            DeployError::transport(format!("invalid compute endpoint {}: {e}", self.endpoint))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                DeployError::transport(format!("invalid compute endpoint {}", self.endpoint))
            })?
            .pop_if_empty()
            .extend(["projects", project_id, "zones", zone, "instances"]);
        Ok(url)
    }
}

#[async_trait]
impl ComputeApi for GceComputeClient {
    async fn insert_instance(
        &self,
        project_id: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, DeployError> {
        let url = self.insert_url(project_id, zone)?;
        let token = self.access_token().await?;

        tracing::info!(
            project_id,
            zone,
            instance_name = %instance.name,
            "calling instances.insert"
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(instance)
            .send()
            .await
            .map_err(|e| DeployError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Operation>()
                .await
                .map_err(|e| DeployError::ProvisioningFailed {
                    status: Some(status.as_u16()),
                    reason: None,
                    detail: format!("decoding operation: {e}"),
                });
        }

        let body = response.text().await.unwrap_or_default();
        Err(rejection(status, &body))
    }
}

/// Map a non-2xx provider response to `ProvisioningFailed`.
fn rejection(status: StatusCode, body: &str) -> DeployError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let (reason, detail) = match parsed {
        Some(ApiErrorBody { error }) => {
            let reason = error
                .errors
                .first()
                .map(|e| e.reason.clone())
                .filter(|r| !r.is_empty());
            let detail = if error.message.is_empty() {
                status.to_string()
            } else {
                error.message
            };
            (reason, detail)
        }
        None if body.trim().is_empty() => (None, status.to_string()),
        None => (None, body.trim().to_string()),
    };
    DeployError::ProvisioningFailed {
        status: Some(status.as_u16()),
        reason,
        detail,
    }
}
