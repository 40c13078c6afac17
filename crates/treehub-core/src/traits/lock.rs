//! Lock provider trait for the hierarchical locking protocol.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for named, leased mutual-exclusion lock backends.
///
/// Acquisition is **non-blocking**: an already-held lock makes
/// [`try_acquire`](Self::try_acquire) return `false` immediately rather
/// than queueing. Leases bound how long a crashed holder can wedge a
/// lock; an expired lease makes the name acquirable again.
#[async_trait]
pub trait LockProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Attempt to acquire the named lock for the given lease duration.
    /// Returns `true` if acquired, `false` if the lock is currently held.
    async fn try_acquire(&self, name: &str, lease: Duration) -> AppResult<bool>;

    /// Release the named lock. Idempotent: releasing a lock that is not
    /// held is a no-op.
    async fn release(&self, name: &str) -> AppResult<()>;

    /// Whether the named lock is currently held (and its lease has not
    /// expired). Intended for diagnostics and tests.
    async fn is_held(&self, name: &str) -> AppResult<bool>;
}
