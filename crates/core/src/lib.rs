//! Core domain types for stackup.
//!
//! Shared by every other crate: service specifications, process lifecycle
//! states, plan step severities, health check results and the launch
//! configuration.

pub mod config;
pub mod domain;
pub mod error;

pub use config::{
    HealthConfig, InfraConfig, LaunchConfig, ProjectConfig, ServiceConfig, ShutdownConfig,
    SupervisionConfig,
};
pub use domain::health::HealthCheckResult;
pub use domain::plan::StepSeverity;
pub use domain::service::{ProcessState, ServiceSpec};
pub use error::{CoreError, Result};
