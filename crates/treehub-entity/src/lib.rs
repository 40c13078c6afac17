//! # treehub-entity
//!
//! Domain entities for TreeHub: the tree node model (one common header
//! plus a kind-tagged payload), sharing grants, and per-user usage
//! counters.

pub mod grants;
pub mod node;
pub mod usage;

pub use grants::{GrantLevel, GrantSet, SharingStatus};
pub use node::{Node, NodeKind, NodePayload};
pub use usage::{UsageCounters, UsageDelta, UsageDeltaMap};
