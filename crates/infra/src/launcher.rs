use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::traits::InfraRuntime;

/// Bring the stack up, then hold for `settle` so dependent services can
/// bind their ports.
///
/// No retry: a failed bring-up (missing image, port conflict) needs a human.
pub async fn start_infra(runtime: &dyn InfraRuntime, settle: Duration) -> Result<()> {
    info!(runtime = runtime.name(), "Bringing infrastructure up");
    runtime.bring_up().await?;

    debug!(settle_ms = settle.as_millis() as u64, "Waiting for infrastructure to settle");
    tokio::time::sleep(settle).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfraError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRuntime {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InfraRuntime for StubRuntime {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn bring_up(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(InfraError::command_failed("compose up -d", "port is already allocated"))
            } else {
                Ok(())
            }
        }

        async fn exec_admin(&self, _payload: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_settle_after_bring_up() {
        let runtime = StubRuntime {
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let started = tokio::time::Instant::now();

        start_infra(&runtime, Duration::from_secs(5)).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(runtime.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_retried_and_skips_settle() {
        let runtime = StubRuntime {
            fail: true,
            calls: AtomicUsize::new(0),
        };
        let started = tokio::time::Instant::now();

        let err = start_infra(&runtime, Duration::from_secs(5)).await.unwrap_err();

        assert!(err.to_string().contains("port is already allocated"));
        assert_eq!(runtime.calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
