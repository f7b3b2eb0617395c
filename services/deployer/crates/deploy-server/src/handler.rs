//! Provisioning handler: resolve → build → submit → respond.
//!
//! Each invocation reads its configuration fresh from the [`ConfigSource`],
//! owns its descriptor, and ends in exactly one terminal stage. A failed
//! invocation is reported to its caller and never affects the process.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use fuel_deploy_common::{DeployError, Operation, ProvisioningConfig, build_instance};

use crate::compute::ComputeApi;

/// Body returned when the provider accepted the insert.
pub const SUCCESS_BODY: &str = "OK";

/// Supplies the environment-style variables a fresh
/// [`ProvisioningConfig`] is resolved from.
pub trait ConfigSource: Send + Sync {
    fn vars(&self) -> Vec<(String, String)>;
}

/// Reads the live process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn vars(&self) -> Vec<(String, String)> {
        fuel_deploy_common::config::process_vars()
    }
}

/// Shared, immutable handles. Nothing here changes between invocations.
#[derive(Clone)]
pub struct AppState {
    compute: Arc<dyn ComputeApi>,
    config_source: Arc<dyn ConfigSource>,
}

impl AppState {
    pub fn new(compute: Arc<dyn ComputeApi>, config_source: Arc<dyn ConfigSource>) -> Self {
        Self {
            compute,
            config_source,
        }
    }
}

/// Progress of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Idle,
    ConfigResolved,
    DescriptorBuilt,
    Submitted,
    Succeeded,
    Failed,
}

impl ProvisionStage {
    fn advance(&mut self, next: Self) {
        tracing::debug!(from = ?*self, to = ?next, "provision stage");
        *self = next;
    }
}

/// Instance name and zone an invocation attempted to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub instance_name: String,
    pub zone: String,
}

/// Terminal failure of one invocation.
#[derive(Debug)]
pub struct ProvisionFailure {
    /// Last stage reached before the invocation moved to `Failed`.
    pub stage: ProvisionStage,
    /// `None` when configuration never resolved, so nothing was attempted.
    pub target: Option<Target>,
    pub error: DeployError,
}

impl ProvisionFailure {
    /// Text returned to the caller. Only references values that were
    /// actually resolved.
    #[must_use]
    pub fn body(&self) -> String {
        match &self.target {
            Some(target) => format!(
                "creating instance {} in zone: {}: {}",
                target.instance_name, target.zone, self.error
            ),
            None => self.error.to_string(),
        }
    }
}

impl IntoResponse for ProvisionFailure {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.body()).into_response()
    }
}

/// Run one provisioning invocation to completion.
pub async fn provision(state: &AppState) -> Result<Operation, ProvisionFailure> {
    let mut stage = ProvisionStage::Idle;

    let config = match ProvisioningConfig::from_vars(state.config_source.vars()) {
        Ok(config) => config,
        Err(error) => return Err(fail(stage, None, error)),
    };
    stage.advance(ProvisionStage::ConfigResolved);

    let target = Target {
        instance_name: config.instance_name().to_string(),
        zone: config.zone().to_string(),
    };

    let instance = match build_instance(&config) {
        Ok(instance) => instance,
        Err(error) => return Err(fail(stage, Some(target), error)),
    };
    stage.advance(ProvisionStage::DescriptorBuilt);

    stage.advance(ProvisionStage::Submitted);
    match state
        .compute
        .insert_instance(config.project_id(), &target.zone, &instance)
        .await
    {
        Ok(operation) => {
            stage.advance(ProvisionStage::Succeeded);
            tracing::info!(
                instance_name = %target.instance_name,
                zone = %target.zone,
                operation = %operation.name,
                status = %operation.status,
                "instance insert accepted"
            );
            Ok(operation)
        }
        Err(error) => Err(fail(stage, Some(target), error)),
    }
}

fn fail(stage: ProvisionStage, target: Option<Target>, error: DeployError) -> ProvisionFailure {
    let (instance_name, zone) = target
        .as_ref()
        .map_or(("", ""), |t| (t.instance_name.as_str(), t.zone.as_str()));
    tracing::debug!(from = ?stage, to = ?ProvisionStage::Failed, "provision stage");
    tracing::error!(?stage, instance_name, zone, %error, "provisioning failed");
    if error.is_name_collision() {
        tracing::warn!(
            instance_name,
            zone,
            "an instance with this name already exists; delete it or change G_CLOUD_COMPUTE_INSTANCE_NAME"
        );
    }
    ProvisionFailure {
        stage,
        target,
        error,
    }
}

/// Entry point for every request to `/`, whatever the method.
pub async fn deploy_instance(
    State(state): State<AppState>,
) -> Result<&'static str, ProvisionFailure> {
    tracing::info!("starting deployment");
    provision(&state).await.map(|_| SUCCESS_BODY)
}

/// Minimal health-check handler for load-balancer probes.
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Compose the HTTP router:
///   - `/`       → deploy the worker instance (any method)
///   - `/health` → liveness probe
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(deploy_instance))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use fuel_deploy_common::config::keys;

    use super::*;
    use crate::compute::MockComputeApi;

    struct FixedVars(Vec<(String, String)>);

    impl ConfigSource for FixedVars {
        fn vars(&self) -> Vec<(String, String)> {
            self.0.clone()
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> Arc<FixedVars> {
        Arc::new(FixedVars(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ))
    }

    fn complete() -> Arc<FixedVars> {
        vars(&[
            (keys::PROJECT_ID, "p1"),
            (keys::ZONE, "z1"),
            (keys::REGION, "r1"),
            (keys::INSTANCE_NAME, "i1"),
            (keys::MACHINE_TYPE, "m1"),
            (keys::CONTAINER_IMAGE, "img:1"),
        ])
    }

    #[tokio::test]
    async fn submits_with_descriptor_name_and_config_zone() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_insert_instance()
            .withf(|project, zone, instance| {
                project.to_string() == "p1"
                    && zone.to_string() == "z1"
                    && instance.name == "i1"
                    && instance.machine_type == "zones/z1/machineTypes/m1"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(Operation {
                    name: "operation-1".to_string(),
                    ..Operation::default()
                })
            });

        let state = AppState::new(Arc::new(compute), complete());
        let op = provision(&state).await.unwrap();
        assert_eq!(op.name, "operation-1");
    }

    #[tokio::test]
    async fn missing_configuration_never_reaches_the_api() {
        let mut compute = MockComputeApi::new();
        compute.expect_insert_instance().never();

        let state = AppState::new(
            Arc::new(compute),
            vars(&[(keys::PROJECT_ID, "p1"), (keys::REGION, "r1")]),
        );
        let failure = provision(&state).await.unwrap_err();

        assert_eq!(failure.stage, ProvisionStage::Idle);
        assert!(failure.target.is_none());
        assert_eq!(failure.body(), "missing configuration: G_CLOUD_COMPUTE_ZONE");
    }

    #[tokio::test]
    async fn submission_failure_names_attempted_instance_and_zone() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_insert_instance()
            .times(1)
            .returning(|_, _, _| {
                Err(DeployError::ProvisioningFailed {
                    status: Some(403),
                    reason: Some("quotaExceeded".to_string()),
                    detail: "Quota 'CPUS' exceeded".to_string(),
                })
            });

        let state = AppState::new(Arc::new(compute), complete());
        let failure = provision(&state).await.unwrap_err();

        assert_eq!(failure.stage, ProvisionStage::Submitted);
        assert_eq!(
            failure.target,
            Some(Target {
                instance_name: "i1".to_string(),
                zone: "z1".to_string(),
            })
        );
        assert_eq!(
            failure.body(),
            "creating instance i1 in zone: z1: provisioning failed (403 quotaExceeded): Quota 'CPUS' exceeded"
        );
        assert_eq!(
            failure.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn configuration_is_read_on_every_invocation() {
        struct CountingVars(std::sync::atomic::AtomicUsize);

        impl ConfigSource for CountingVars {
            fn vars(&self) -> Vec<(String, String)> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Vec::new()
            }
        }

        let source = Arc::new(CountingVars(std::sync::atomic::AtomicUsize::new(0)));
        let mut compute = MockComputeApi::new();
        compute.expect_insert_instance().never();
        let state = AppState::new(Arc::new(compute), source.clone());

        assert!(provision(&state).await.is_err());
        assert!(provision(&state).await.is_err());
        assert_eq!(source.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
