//! Explicit stack of acquired locks, released in reverse order.
//!
//! Recursive operations acquire locks top-down (parent before children)
//! and must release them in reverse acquisition order on every exit
//! path, success or failure. A [`LockSet`] records the order and unwinds
//! it; on any failure mid-recursion the caller releases the whole set
//! before propagating, so a failed deep lock never leaks.

use tracing::warn;

use treehub_core::result::AppResult;

use crate::manager::LockManager;

/// An ordered set of held lock names.
///
/// Release is asynchronous, so the set cannot unwind itself in `Drop`;
/// dropping a non-empty set logs a leak warning instead. Every exit path
/// of an engine operation must call [`release_all`](Self::release_all).
#[derive(Debug)]
pub struct LockSet {
    manager: LockManager,
    names: Vec<String>,
}

impl LockSet {
    /// Create an empty lock set bound to a manager.
    pub fn new(manager: LockManager) -> Self {
        Self {
            manager,
            names: Vec::new(),
        }
    }

    /// Acquire a lock and record it. On failure nothing is recorded; the
    /// locks already held remain held (the caller decides whether to
    /// unwind).
    pub async fn lock(&mut self, name: &str) -> AppResult<()> {
        self.manager.lock(name).await?;
        self.names.push(name.to_string());
        Ok(())
    }

    /// Release every held lock in reverse acquisition order.
    pub async fn release_all(&mut self) -> AppResult<()> {
        while let Some(name) = self.names.pop() {
            self.manager.release(&name).await?;
        }
        Ok(())
    }

    /// Release the most recently acquired lock, if any.
    pub async fn release_last(&mut self) -> AppResult<()> {
        if let Some(name) = self.names.pop() {
            self.manager.release(&name).await?;
        }
        Ok(())
    }

    /// Move every lock held by `other` into this set, preserving order.
    /// Used when a nested deep-lock succeeds and its locks become part of
    /// the caller's unwind responsibility.
    pub fn absorb(&mut self, mut other: LockSet) {
        self.names.append(&mut other.names);
    }

    /// Number of locks currently held by this set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set holds no locks.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        if !self.names.is_empty() {
            warn!(
                held = self.names.len(),
                first = %self.names[0],
                "LockSet dropped while still holding locks; leases will expire"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_core::config::lock::LockConfig;

    fn manager() -> LockManager {
        LockManager::new(&LockConfig {
            enabled: true,
            lease_seconds: 30,
        })
    }

    #[tokio::test]
    async fn test_release_all_frees_every_lock() {
        let manager = manager();
        let mut set = LockSet::new(manager.clone());
        set.lock("edit:a").await.unwrap();
        set.lock("edit:b").await.unwrap();
        assert_eq!(set.len(), 2);

        set.release_all().await.unwrap();
        assert!(set.is_empty());
        assert!(!manager.is_held("edit:a").await.unwrap());
        assert!(!manager.is_held("edit:b").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_lock_leaves_prior_locks_recorded() {
        let manager = manager();
        manager.lock("edit:b").await.unwrap();

        let mut set = LockSet::new(manager.clone());
        set.lock("edit:a").await.unwrap();
        assert!(set.lock("edit:b").await.is_err());
        // The set still tracks edit:a so the caller can unwind it.
        assert_eq!(set.len(), 1);
        set.release_all().await.unwrap();
        assert!(!manager.is_held("edit:a").await.unwrap());
        // The foreign holder's lock is untouched.
        assert!(manager.is_held("edit:b").await.unwrap());
    }

    #[tokio::test]
    async fn test_absorb_preserves_order() {
        let manager = manager();
        let mut outer = LockSet::new(manager.clone());
        outer.lock("edit:a").await.unwrap();

        let mut inner = LockSet::new(manager.clone());
        inner.lock("edit:b").await.unwrap();
        outer.absorb(inner);

        assert_eq!(outer.len(), 2);
        outer.release_all().await.unwrap();
        assert!(!manager.is_held("edit:b").await.unwrap());
    }
}
