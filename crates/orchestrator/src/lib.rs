//! Startup and shutdown orchestration for the application stack.
//!
//! The default plan is a fixed linear chain: infrastructure, then data,
//! then backend, then frontend. After the last step the [`Launcher`]
//! idles until a signal arrives and hands over to the
//! [`ShutdownCoordinator`].

pub mod error;
pub mod executor;
pub mod health;
pub mod launcher;
pub mod plan;
pub mod shutdown;
pub mod steps;

pub use error::{OrchestratorError, Result};
pub use executor::{PlanExecutor, PlanReport, StepRecord, StepStatus};
pub use health::HealthPoller;
pub use launcher::{Launcher, RunSummary};
pub use plan::{OrchestrationPlan, PlanStep, StepAction, StepOutcome};
pub use shutdown::{listen_for_signals, ShutdownCoordinator, ShutdownReason};
pub use steps::SharedSupervisor;
