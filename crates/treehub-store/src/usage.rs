//! Per-user usage accounting.

use dashmap::DashMap;
use tracing::{debug, warn};

use treehub_core::result::AppResult;
use treehub_core::types::UserId;
use treehub_entity::usage::{UsageCounters, UsageDelta, UsageDeltaMap};

/// Tracks per-user aggregate counts of owned root folders, folders,
/// files, and bytes.
///
/// Counter records are created lazily per user. Updates are best-effort
/// companions of the structural changes; a crash between a structural
/// change and its counter update leaves the counters stale, with a
/// periodic recompute as the recovery path.
#[derive(Debug, Default)]
pub struct UsageAccountant {
    counters: DashMap<UserId, UsageCounters>,
}

impl UsageAccountant {
    /// Create an empty accountant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an additive delta to one user's counters.
    pub async fn apply_delta(&self, user: UserId, delta: UsageDelta) -> AppResult<()> {
        let mut entry = self.counters.entry(user).or_default();
        *entry += delta;
        if !entry.is_consistent() {
            warn!(user = %user, counters = ?*entry, "usage counters went negative");
        }
        Ok(())
    }

    /// Apply every delta accumulated by a recursive operation.
    pub async fn apply_delta_map(&self, deltas: &UsageDeltaMap) -> AppResult<()> {
        for (user, delta) in deltas.iter() {
            self.apply_delta(*user, *delta).await?;
        }
        if !deltas.is_empty() {
            debug!("applied usage deltas");
        }
        Ok(())
    }

    /// Current counters for a user (zeroes if never seen).
    pub async fn get_usage(&self, user: UserId) -> AppResult<UsageCounters> {
        Ok(self.counters.get(&user).map(|c| *c).unwrap_or_default())
    }

    /// Reset one user's counters.
    pub async fn clear_usage(&self, user: UserId) -> AppResult<()> {
        self.counters.remove(&user);
        Ok(())
    }

    /// Reset every user's counters.
    pub async fn clear_all_usage(&self) -> AppResult<()> {
        self.counters.clear();
        Ok(())
    }

    /// Snapshot of all counters (persistence and diagnostics).
    pub fn all_counters(&self) -> Vec<(UserId, UsageCounters)> {
        self.counters.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    /// Replace all counters (snapshot restore).
    pub fn replace_all(&self, counters: Vec<(UserId, UsageCounters)>) {
        self.counters.clear();
        for (user, c) in counters {
            self.counters.insert(user, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_creation_and_accumulation() {
        let accountant = UsageAccountant::new();
        let user = UserId::new();
        assert_eq!(
            accountant.get_usage(user).await.unwrap(),
            UsageCounters::default()
        );

        accountant
            .apply_delta(user, UsageDelta::file(100))
            .await
            .unwrap();
        accountant
            .apply_delta(user, UsageDelta::folder(0))
            .await
            .unwrap();

        let usage = accountant.get_usage(user).await.unwrap();
        assert_eq!(usage.files, 1);
        assert_eq!(usage.folders, 1);
        assert_eq!(usage.bytes, 100);
    }

    #[tokio::test]
    async fn test_delta_map_applied_per_user() {
        let accountant = UsageAccountant::new();
        let a = UserId::new();
        let b = UserId::new();
        let mut map = UsageDeltaMap::new();
        map.reassign(a, b, UsageDelta::file(10));
        accountant.apply_delta_map(&map).await.unwrap();

        assert_eq!(accountant.get_usage(a).await.unwrap().files, -1);
        assert_eq!(accountant.get_usage(b).await.unwrap().files, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let accountant = UsageAccountant::new();
        let user = UserId::new();
        accountant
            .apply_delta(user, UsageDelta::root_folder(0))
            .await
            .unwrap();
        accountant.clear_usage(user).await.unwrap();
        assert_eq!(
            accountant.get_usage(user).await.unwrap(),
            UsageCounters::default()
        );
    }
}
