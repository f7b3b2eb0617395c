//! HTTP-triggered deployer for the preemptible fuel-price worker instance.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod compute;
pub mod handler;
pub mod shutdown;

pub use compute::{ComputeApi, GceComputeClient, TokenSource};
pub use handler::{AppState, ConfigSource, ProcessEnv, ProvisionFailure, ProvisionStage, router};
pub use shutdown::shutdown_signal;
