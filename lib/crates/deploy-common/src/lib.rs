//! Domain types and pure builders for the fuel-price worker deployer.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod types;

pub use config::{ProvisioningConfig, ServerConfig};
pub use container::ContainerDeclaration;
pub use descriptor::build_instance;
pub use error::DeployError;
pub use types::{Instance, Operation};
