//! # treehub-store
//!
//! Shared mutable state of the tree engine: the node store (point CRUD
//! plus the child/ancestor/descendant queries every recursive walk is
//! built from) and the per-user usage accountant.
//!
//! Neither structure locks anything itself; callers serialize structural
//! mutation through the lock manager. Reads are lock-free and may observe
//! a tree mid-mutation.

pub mod snapshot;
pub mod store;
pub mod usage;

pub use snapshot::TreeSnapshot;
pub use store::MemoryNodeStore;
pub use usage::UsageAccountant;
