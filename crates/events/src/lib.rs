//! Event system for stackup
//!
//! Progress of the launch pipeline is published as events on a broadcast
//! bus; the CLI renders them, tests assert on them.

mod bus;
mod types;

pub use bus::{BusStats, EventBus};
pub use types::*;
