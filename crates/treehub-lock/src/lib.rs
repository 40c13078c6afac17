//! # treehub-lock
//!
//! The TreeHub lock manager: named, leased, non-blocking mutual
//! exclusion. Locks are the only concurrency-control mechanism in the
//! system; there is no database transaction layer underneath.
//!
//! - [`memory::MemoryLockProvider`] — in-process lease table (dashmap)
//! - [`manager::LockManager`] — configured dispatch wrapper, including
//!   the globally-disabled degraded mode
//! - [`guard::LockSet`] — explicit acquisition stack released in reverse
//!   order, the building block of the deep-lock unwind protocol

pub mod guard;
pub mod keys;
pub mod manager;
pub mod memory;

pub use guard::LockSet;
pub use manager::LockManager;
pub use memory::MemoryLockProvider;
