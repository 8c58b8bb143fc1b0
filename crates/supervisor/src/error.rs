use stackup_core::ProcessState;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Service '{0}' is already running")]
    AlreadyRunning(String),

    #[error("{name} directory not found: {}", path.display())]
    WorkingDirMissing { name: String, path: PathBuf },

    #[error("Failed to start '{name}' ({command}): {source}")]
    SpawnFailed {
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid process state transition from {from} to {to}")]
    InvalidTransition { from: ProcessState, to: ProcessState },
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
