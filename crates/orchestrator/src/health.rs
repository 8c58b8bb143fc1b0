use events::{Event, EventBus};
use stackup_core::{HealthCheckResult, HealthConfig};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Polls a service's HTTP readiness endpoint with bounded retries.
///
/// Readiness only decides what gets reported; a service that never turns
/// ready is a warning, not a reason to stop.
pub struct HealthPoller {
    client: reqwest::Client,
    service: String,
    url: String,
    max_attempts: u32,
    retry_interval: Duration,
    events: Option<EventBus>,
}

impl HealthPoller {
    pub fn new(service: impl Into<String>, config: &HealthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            service: service.into(),
            url: config.url.clone(),
            max_attempts: config.max_attempts,
            retry_interval: config.retry_interval(),
            events: None,
        })
    }

    /// Report each failed attempt on the bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Up to `max_attempts` sequential GETs; stops at the first 2xx.
    /// Sleeps between attempts, not after the last one.
    pub async fn poll(&self) -> HealthCheckResult {
        for attempt in 1..=self.max_attempts {
            if self.check_once().await {
                debug!(service = %self.service, attempt, "Health check passed");
                return HealthCheckResult::ready(attempt);
            }

            if let Some(events) = &self.events {
                events.emit(Event::HealthWaiting {
                    service: self.service.clone(),
                    attempt,
                    max_attempts: self.max_attempts,
                });
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        HealthCheckResult::not_ready(self.max_attempts)
    }

    async fn check_once(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    debug!(service = %self.service, %status, "Health endpoint not ready");
                }
                status.is_success()
            }
            Err(e) => {
                debug!(service = %self.service, error = %e, "Health endpoint unreachable");
                false
            }
        }
    }
}

impl std::fmt::Debug for HealthPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthPoller")
            .field("service", &self.service)
            .field("url", &self.url)
            .field("max_attempts", &self.max_attempts)
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}
