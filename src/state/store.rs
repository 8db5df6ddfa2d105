//! State store trait definition.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::ProviderState;
use crate::error::Result;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the state; `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<ProviderState>>;

    /// Saves the state.
    async fn save(&self, state: &ProviderState) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires the state lock.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases the lock if `lock_id` still holds it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Current lock, if any.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
