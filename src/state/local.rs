//! File-backed state store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ProviderError, Result, StateError};

use super::lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
use super::store::StateStore;
use super::types::ProviderState;

/// Default state directory name.
const STATE_DIR: &str = ".linode-provider";

/// State file name.
const STATE_FILE: &str = "state.json";

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

fn corrupted(what: &str, e: impl std::fmt::Display) -> ProviderError {
    StateError::Corrupted {
        message: format!("{what}: {e}"),
    }
    .into()
}

fn write_failed(what: &str, e: impl std::fmt::Display) -> ProviderError {
    StateError::WriteFailed {
        message: format!("{what}: {e}"),
    }
    .into()
}

fn lock_failed(what: &str, e: impl std::fmt::Display) -> ProviderError {
    StateError::LockFailed {
        message: format!("{what}: {e}"),
    }
    .into()
}

/// Local file-based state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    base_dir: PathBuf,
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// A store under `.linode-provider/` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| ProviderError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);
        Ok(Self::with_base_dir(base_dir))
    }

    /// A store in `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            state_path: base_dir.join(STATE_FILE),
            lock_path: base_dir.join(LOCK_FILE),
            base_dir,
        }
    }

    /// A store writing to an explicit state file; the lock sits beside it.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            lock_path: base_dir.join(LOCK_FILE),
            base_dir,
            state_path,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| write_failed("Failed to create state directory", e))?;
        }
        Ok(())
    }

    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.lock_path)
            .await
            .map_err(|e| corrupted("Failed to read lock file", e))?;
        let lock = serde_json::from_str(&content).map_err(|e| corrupted("Failed to parse lock file", e))?;
        Ok(Some(lock))
    }

    async fn write_lock_file(&self, lock: &LockInfo) -> Result<()> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(lock).map_err(|e| StateError::SerializationError {
            message: format!("Failed to serialize lock: {e}"),
        })?;

        let mut file = fs::File::create(&self.lock_path)
            .await
            .map_err(|e| lock_failed("Failed to create lock file", e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| lock_failed("Failed to write lock file", e))?;
        file.sync_all()
            .await
            .map_err(|e| lock_failed("Failed to sync lock file", e))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<ProviderState>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }
        debug!("Loading state from {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path)
            .await
            .map_err(|e| corrupted("Failed to read state file", e))?;
        let state = serde_json::from_str(&content).map_err(|e| corrupted("Failed to parse state file", e))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ProviderState) -> Result<()> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(state).map_err(|e| StateError::SerializationError {
            message: format!("Failed to serialize state: {e}"),
        })?;

        // Write beside the target, then rename over it.
        let temp_path = self.state_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| write_failed("Failed to create temp state file", e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| write_failed("Failed to write state file", e))?;
        file.sync_all()
            .await
            .map_err(|e| write_failed("Failed to sync state file", e))?;
        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| write_failed("Failed to rename state file", e))?;

        debug!("Saved state to {}", self.state_path.display());
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }
            debug!("Taking over expired lock held by {}", existing.holder);
        }

        let holder = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock = LockInfo::new(&holder);
        self.write_lock_file(&lock).await?;
        info!("Acquired state lock {} (expires in {}s)", lock.lock_id, LOCK_EXPIRY_SECS);
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        match self.read_lock_file().await? {
            Some(existing) if existing.lock_id == lock_id => {
                fs::remove_file(&self.lock_path)
                    .await
                    .map_err(|e| lock_failed("Failed to delete lock file", e))?;
                debug!("Released state lock {}", lock_id);
            }
            Some(existing) => debug!(
                "Lock {} is held by {}, not releasing",
                existing.lock_id, existing.holder
            ),
            None => {}
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
