//! Infrastructure layer: the containerized backing service.
//!
//! - [`InfraRuntime`] - probe, bring-up and admin access to the runtime
//! - [`ComposeRuntime`] - docker + compose implementation
//! - [`start_infra`] - bring-up followed by the settle delay
//! - [`apply_init_script`] - feed the init payload into the data store

pub mod compose;
pub mod error;
pub mod initializer;
pub mod launcher;
pub mod traits;

pub use compose::{ComposeRuntime, ComposeSettings};
pub use error::{InfraError, Result};
pub use initializer::{apply_init_script, InitOutcome};
pub use launcher::start_infra;
pub use traits::InfraRuntime;
