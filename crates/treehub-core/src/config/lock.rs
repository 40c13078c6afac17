//! Lock manager configuration.

use serde::{Deserialize, Serialize};

/// Lock manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Whether locking is enabled. Disabling locks is a supported degraded
    /// mode (every acquire succeeds, release is a no-op) for single-actor
    /// maintenance runs. It must never be used when concurrent actors can
    /// mutate the tree.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lock lease duration in seconds. A holder that crashes without
    /// releasing loses the lock once the lease elapses.
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
}

impl LockConfig {
    /// The configured lease as a [`std::time::Duration`].
    pub fn lease(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lease_seconds)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lease_seconds: default_lease_seconds(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_lease_seconds() -> u64 {
    30
}
