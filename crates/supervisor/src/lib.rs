//! Process supervision for long-lived service children.
//!
//! The [`ProcessSupervisor`] owns every child handle. Other components
//! ask it to spawn, probe and terminate by service name; nothing else
//! touches a child directly.
//!
//! - [`SpawnStrategy`] - how a child is started ([`CapturedBackground`],
//!   or a visible terminal window on Windows)
//! - [`ServiceProcess`] - one tracked child and its lifecycle state
//! - [`ProcessStateMachine`] - allowed lifecycle transitions

pub mod error;
pub mod output;
pub mod process;
mod signal;
pub mod state_machine;
pub mod strategy;
pub mod supervisor;

pub use error::{Result, SupervisorError};
pub use output::OutputTail;
pub use process::{ProcessInfo, ServiceProcess, TerminationOutcome, TerminationPolicy};
pub use state_machine::ProcessStateMachine;
#[cfg(windows)]
pub use strategy::VisibleTerminal;
pub use strategy::{platform_default, CapturedBackground, SpawnStrategy, SpawnedChild};
pub use supervisor::{ExitNotice, ProcessSupervisor, ShutdownReport};
