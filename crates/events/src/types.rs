//! Event types for the stackup event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All possible events in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Plan events
    /// A plan step is about to run
    #[serde(rename = "step.started")]
    StepStarted {
        index: usize,
        total: usize,
        title: String,
    },

    /// A step finished successfully
    #[serde(rename = "step.succeeded")]
    StepSucceeded { title: String, detail: String },

    /// A step had nothing to do
    #[serde(rename = "step.skipped")]
    StepSkipped { title: String, reason: String },

    /// A step finished but something is not quite right
    #[serde(rename = "step.degraded")]
    StepDegraded { title: String, warning: String },

    /// An advisory step failed; the run continues
    #[serde(rename = "step.advisory_failure")]
    AdvisoryFailure {
        title: String,
        cause: String,
        hint: Option<String>,
    },

    /// A fatal step failed; the run aborts
    #[serde(rename = "step.fatal_failure")]
    FatalFailure { title: String, cause: String },

    // Health events
    /// A health check attempt did not succeed
    #[serde(rename = "health.waiting")]
    HealthWaiting {
        service: String,
        attempt: u32,
        max_attempts: u32,
    },

    // Service events
    /// A service process was spawned
    #[serde(rename = "service.spawned")]
    ServiceSpawned { name: String, pid: Option<u32> },

    /// A service exited without being asked to
    #[serde(rename = "service.exited")]
    ServiceExited {
        name: String,
        status: String,
        recent_output: Vec<String>,
    },

    // Lifecycle events
    /// All steps ran; now idling until interrupted
    #[serde(rename = "launch.running")]
    StartupComplete {
        project: String,
        services: Vec<ServiceLine>,
        health_url: String,
    },

    /// A shutdown signal was received
    #[serde(rename = "shutdown.started")]
    ShutdownStarted { reason: String },

    /// A further signal arrived while shutting down
    #[serde(rename = "shutdown.already_in_progress")]
    ShutdownAlreadyInProgress { reason: String },

    /// Every tracked process was dealt with
    #[serde(rename = "shutdown.completed")]
    ShutdownCompleted {
        terminated: usize,
        forced: usize,
        unresponsive: Vec<String>,
    },
}

/// One row of the startup summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub name: String,
    pub url: Option<String>,
    pub running: bool,
}

impl Event {
    /// Whether this event reports a failure of any class
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::AdvisoryFailure { .. } | Event::FatalFailure { .. }
        )
    }
}
