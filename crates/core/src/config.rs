//! Launch configuration.
//!
//! Loaded from `stackup.toml` by the CLI. Every section has defaults that
//! describe the stock stack (postgres in docker, `npm` backend, `flutter`
//! web frontend), so an absent file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::service::ServiceSpec;
use crate::error::{CoreError, Result};

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_HEALTH_URL: &str = "http://localhost:3000/api/health";
const FLUTTER_INSTALL_URL: &str = "https://flutter.dev/docs/get-started/install";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub project: ProjectConfig,
    pub infra: InfraConfig,
    pub backend: ServiceConfig,
    pub frontend: ServiceConfig,
    pub health: HealthConfig,
    pub shutdown: ShutdownConfig,
    pub supervision: SupervisionConfig,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            infra: InfraConfig::default(),
            backend: ServiceConfig::backend(),
            frontend: ServiceConfig::frontend(),
            health: HealthConfig::default(),
            shutdown: ShutdownConfig::default(),
            supervision: SupervisionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "VibeCheck".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraConfig {
    /// Container runtime CLI, probed with `<program> ps`
    pub runtime_program: String,
    /// Compose invocation; empty means auto-detect
    pub compose_command: Vec<String>,
    pub settle_secs: u64,
    /// Container hosting the database
    pub container: String,
    pub db_user: String,
    pub db_name: String,
    /// Init script, relative to the project root
    pub init_script: PathBuf,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            runtime_program: "docker".to_string(),
            compose_command: Vec::new(),
            settle_secs: 5,
            container: "vibecheck-postgres".to_string(),
            db_user: "vibecheck".to_string(),
            db_name: "vibecheck".to_string(),
            init_script: PathBuf::from("backend").join("init-db.sql"),
        }
    }
}

impl InfraConfig {
    pub fn settle_duration(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// One supervised service (backend or frontend).
///
/// A section in the config file replaces the stock definition, so `name`
/// and `program` are required there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Service directory, relative to the project root; defaults to `name`
    #[serde(default)]
    pub dir: Option<PathBuf>,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Where the service can be reached once up, shown in the summary
    #[serde(default)]
    pub url: Option<String>,
    /// Tool that must be on PATH for this service to start
    #[serde(default)]
    pub required_tool: Option<String>,
    /// Shown when `required_tool` is missing
    #[serde(default)]
    pub install_hint: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ServiceConfig {
    pub fn backend() -> Self {
        Self {
            name: "backend".to_string(),
            dir: None,
            program: "npm".to_string(),
            args: vec!["run".to_string(), "dev".to_string()],
            url: Some(DEFAULT_BACKEND_URL.to_string()),
            required_tool: None,
            install_hint: None,
            enabled: true,
        }
    }

    pub fn frontend() -> Self {
        Self {
            name: "frontend".to_string(),
            dir: None,
            program: "flutter".to_string(),
            args: vec!["run".to_string(), "-d".to_string(), "chrome".to_string()],
            url: None,
            required_tool: Some("flutter".to_string()),
            install_hint: Some(FLUTTER_INSTALL_URL.to_string()),
            enabled: true,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }

    /// Resolve against the project root.
    pub fn to_spec(&self, root: &Path) -> ServiceSpec {
        ServiceSpec::new(&self.name, &self.program, root.join(self.dir()))
            .with_args(self.args.iter().cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub url: String,
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HEALTH_URL.to_string(),
            max_attempts: 5,
            retry_interval_ms: 2000,
            request_timeout_ms: 5000,
        }
    }
}

impl HealthConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub grace_period_secs: u64,
    /// Bounded wait for exit after a forced kill
    pub force_wait_secs: u64,
    /// Upper bound on the whole shutdown sequence
    pub hard_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 5,
            force_wait_secs: 5,
            hard_timeout_secs: 30,
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn force_wait(&self) -> Duration {
        Duration::from_secs(self.force_wait_secs)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// How often the idle wait checks for children that exited on their own
    pub liveness_interval_ms: u64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: 1000,
        }
    }
}

impl SupervisionConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }
}

impl LaunchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.health.max_attempts == 0 {
            return Err(CoreError::invalid(
                "health.max_attempts",
                "must be at least 1",
            ));
        }
        if self.health.url.trim().is_empty() {
            return Err(CoreError::invalid("health.url", "must not be empty"));
        }
        if self.shutdown.grace_period_secs == 0 {
            return Err(CoreError::invalid(
                "shutdown.grace_period_secs",
                "must be greater than zero",
            ));
        }
        if self.supervision.liveness_interval_ms == 0 {
            return Err(CoreError::invalid(
                "supervision.liveness_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.infra.runtime_program.trim().is_empty() {
            return Err(CoreError::invalid(
                "infra.runtime_program",
                "must not be empty",
            ));
        }

        let mut seen = HashSet::new();
        let services = [
            (&self.backend, "backend.program"),
            (&self.frontend, "frontend.program"),
        ];
        for (service, program_field) in services {
            if service.program.trim().is_empty() {
                return Err(CoreError::invalid(
                    program_field,
                    format!("service '{}' has no program", service.name),
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(CoreError::DuplicateService(service.name.clone()));
            }
        }

        Ok(())
    }
}
