use async_trait::async_trait;

use crate::error::Result;

/// Access to the runtime hosting the backing data store.
#[async_trait]
pub trait InfraRuntime: Send + Sync {
    /// Get the name of the runtime backend
    fn name(&self) -> &'static str;

    /// Whether the runtime's control surface answers.
    ///
    /// Never fails: an absent binary or unreachable daemon is `false`.
    async fn is_available(&self) -> bool;

    /// Ask for the service stack to be brought up, detached.
    ///
    /// Returns once the command itself has finished; callers wait for
    /// ports to bind separately.
    async fn bring_up(&self) -> Result<()>;

    /// Stream a payload into the data store's administrative interface.
    async fn exec_admin(&self, payload: Vec<u8>) -> Result<()>;
}
