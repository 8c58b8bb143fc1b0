use std::path::Path;
use tracing::{debug, info};

use crate::error::{InfraError, Result};
use crate::traits::InfraRuntime;

/// What happened to the init script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The payload was accepted by the data store
    Applied { bytes: usize },
    /// No script at the expected location
    Skipped,
}

/// Feed the init script at `path` into the running data store.
///
/// An absent script is not an error. Re-application is expected to be
/// harmless since the script uses create-if-absent statements.
pub async fn apply_init_script(runtime: &dyn InfraRuntime, path: &Path) -> Result<InitOutcome> {
    let payload = match tokio::fs::read(path).await {
        Ok(payload) => payload,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No init script at {:?}", path);
            return Ok(InitOutcome::Skipped);
        }
        Err(source) => {
            return Err(InfraError::ReadScript {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let bytes = payload.len();
    info!(bytes, script = %path.display(), "Applying init script");
    runtime.exec_admin(payload).await?;

    Ok(InitOutcome::Applied { bytes })
}
