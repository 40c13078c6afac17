//! In-process lock provider backed by a dashmap lease table.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use treehub_core::result::AppResult;
use treehub_core::traits::lock::LockProvider;

/// In-memory lock provider.
///
/// Each held lock maps its name to a lease deadline. An entry whose
/// deadline has passed is treated as free and can be taken over; the
/// dashmap entry API makes the check-and-claim atomic per name.
#[derive(Debug, Default)]
pub struct MemoryLockProvider {
    /// Lock name to lease deadline.
    leases: DashMap<String, Instant>,
}

impl MemoryLockProvider {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) locks. Diagnostics only.
    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        self.leases.iter().filter(|e| *e.value() > now).count()
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn try_acquire(&self, name: &str, lease: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let deadline = now + lease;
        let acquired = match self.leases.entry(name.to_string()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    false
                } else {
                    // Expired lease: take the lock over.
                    held.insert(deadline);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(deadline);
                true
            }
        };
        trace!(name, acquired, "lock acquire attempt");
        Ok(acquired)
    }

    async fn release(&self, name: &str) -> AppResult<()> {
        self.leases.remove(name);
        trace!(name, "lock released");
        Ok(())
    }

    async fn is_held(&self, name: &str) -> AppResult<bool> {
        Ok(self
            .leases
            .get(name)
            .is_some_and(|deadline| *deadline > Instant::now()))
    }
}
