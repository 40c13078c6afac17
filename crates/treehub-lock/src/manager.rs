//! Lock manager that wraps the configured provider.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use treehub_core::config::lock::LockConfig;
use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::lock::LockProvider;

use crate::memory::MemoryLockProvider;

/// Lock manager wrapping the configured lock provider.
///
/// When locking is disabled by configuration ([`LockConfig::enabled`] is
/// false), every acquire succeeds and release is a no-op. This is a
/// supported degraded mode for single-actor maintenance runs, never the
/// production default.
#[derive(Debug, Clone)]
pub struct LockManager {
    /// The inner lock provider.
    inner: Arc<dyn LockProvider>,
    /// Whether locking is enabled.
    enabled: bool,
    /// Lease duration applied to every acquisition.
    lease: Duration,
}

impl LockManager {
    /// Create a lock manager from configuration, using the in-process
    /// provider.
    pub fn new(config: &LockConfig) -> Self {
        if !config.enabled {
            warn!("Locking is DISABLED; concurrent tree mutation is unsafe in this mode");
        } else {
            info!(lease_seconds = config.lease_seconds, "Lock manager ready");
        }
        Self {
            inner: Arc::new(MemoryLockProvider::new()),
            enabled: config.enabled,
            lease: config.lease(),
        }
    }

    /// Create a lock manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn LockProvider>, config: &LockConfig) -> Self {
        Self {
            inner: provider,
            enabled: config.enabled,
            lease: config.lease(),
        }
    }

    /// Attempt to acquire the named lock. Returns `false` immediately if
    /// the lock is held; this layer never waits or retries.
    pub async fn try_acquire(&self, name: &str) -> AppResult<bool> {
        if !self.enabled {
            return Ok(true);
        }
        self.inner.try_acquire(name, self.lease).await
    }

    /// Acquire the named lock or fail with a resource-busy error.
    pub async fn lock(&self, name: &str) -> AppResult<()> {
        if self.try_acquire(name).await? {
            Ok(())
        } else {
            Err(AppError::busy(format!("Resource is busy: {name}")))
        }
    }

    /// Release the named lock. Idempotent.
    pub async fn release(&self, name: &str) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.inner.release(name).await
    }

    /// Whether the named lock is currently held.
    pub async fn is_held(&self, name: &str) -> AppResult<bool> {
        if !self.enabled {
            return Ok(false);
        }
        self.inner.is_held(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_core::error::ErrorKind;

    fn enabled_config() -> LockConfig {
        LockConfig {
            enabled: true,
            lease_seconds: 30,
        }
    }

    #[tokio::test]
    async fn test_lock_returns_busy_kind() {
        let manager = LockManager::new(&enabled_config());
        manager.lock("edit:x").await.unwrap();
        let err = manager.lock("edit:x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Busy);
    }

    #[tokio::test]
    async fn test_disabled_mode_always_acquires() {
        let manager = LockManager::new(&LockConfig {
            enabled: false,
            lease_seconds: 30,
        });
        manager.lock("edit:x").await.unwrap();
        manager.lock("edit:x").await.unwrap();
        assert!(!manager.is_held("edit:x").await.unwrap());
        manager.release("edit:x").await.unwrap();
    }
}
