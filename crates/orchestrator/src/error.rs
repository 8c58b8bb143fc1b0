use infra::InfraError;
use stackup_core::CoreError;
use supervisor::SupervisorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0} is not running. Please start it first.")]
    InfraUnavailable(String),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("{tool} is not installed")]
    ToolchainMissing { tool: String, hint: Option<String> },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{step} failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<OrchestratorError>,
    },
}

impl OrchestratorError {
    /// Wrap a step's error so the message names the step.
    pub fn step_failed(step: impl Into<String>, source: OrchestratorError) -> Self {
        Self::StepFailed {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Follow-up advice for the user, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::ToolchainMissing { hint, .. } => hint.as_deref(),
            Self::StepFailed { source, .. } => source.hint(),
            _ => None,
        }
    }

    /// Name of the failed step, for errors produced by the plan executor.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
