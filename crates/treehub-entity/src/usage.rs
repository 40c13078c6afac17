//! Per-user usage counters and the deltas that update them.
//!
//! Recursive operations accumulate a [`UsageDeltaMap`] through the
//! recursion and apply it once at the top level, so a partially failed
//! walk applies exactly the deltas of the nodes it actually changed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use treehub_core::types::UserId;

/// Aggregate counts of what a user owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Number of root folders owned.
    pub root_folders: i64,
    /// Number of non-root folders owned.
    pub folders: i64,
    /// Number of file-like nodes owned.
    pub files: i64,
    /// Total bytes owned.
    pub bytes: i64,
}

impl UsageCounters {
    /// Whether every counter is non-negative. A negative counter after a
    /// completed operation is an invariant violation.
    pub fn is_consistent(&self) -> bool {
        self.root_folders >= 0 && self.folders >= 0 && self.files >= 0 && self.bytes >= 0
    }
}

/// An additive change to a user's counters. Fields may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    /// Root folder count change.
    pub root_folders: i64,
    /// Folder count change.
    pub folders: i64,
    /// File count change.
    pub files: i64,
    /// Byte count change.
    pub bytes: i64,
}

impl UsageDelta {
    /// A delta for one root folder of the given size.
    pub fn root_folder(bytes: i64) -> Self {
        Self {
            root_folders: 1,
            bytes,
            ..Self::default()
        }
    }

    /// A delta for one folder of the given size.
    pub fn folder(bytes: i64) -> Self {
        Self {
            folders: 1,
            bytes,
            ..Self::default()
        }
    }

    /// A delta for one file-like node of the given size.
    pub fn file(bytes: i64) -> Self {
        Self {
            files: 1,
            bytes,
            ..Self::default()
        }
    }

    /// The additive inverse of this delta.
    pub fn negated(&self) -> Self {
        Self {
            root_folders: -self.root_folders,
            folders: -self.folders,
            files: -self.files,
            bytes: -self.bytes,
        }
    }
}

impl std::ops::AddAssign for UsageDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.root_folders += rhs.root_folders;
        self.folders += rhs.folders;
        self.files += rhs.files;
        self.bytes += rhs.bytes;
    }
}

impl std::ops::AddAssign<UsageDelta> for UsageCounters {
    fn add_assign(&mut self, rhs: UsageDelta) {
        self.root_folders += rhs.root_folders;
        self.folders += rhs.folders;
        self.files += rhs.files;
        self.bytes += rhs.bytes;
    }
}

/// Per-user deltas accumulated during one recursive operation.
#[derive(Debug, Clone, Default)]
pub struct UsageDeltaMap {
    deltas: HashMap<UserId, UsageDelta>,
}

impl UsageDeltaMap {
    /// An empty delta map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta for one user.
    pub fn add(&mut self, user: UserId, delta: UsageDelta) {
        *self.deltas.entry(user).or_default() += delta;
    }

    /// Record a reassignment of one delta's worth of usage from one user
    /// to another (chown).
    pub fn reassign(&mut self, from: UserId, to: UserId, delta: UsageDelta) {
        self.add(from, delta.negated());
        self.add(to, delta);
    }

    /// Whether no deltas were recorded.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Iterate over the per-user deltas.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &UsageDelta)> {
        self.deltas.iter()
    }
}
