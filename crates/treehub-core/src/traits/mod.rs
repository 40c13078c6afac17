//! Boundary traits consumed and implemented across TreeHub crates.
//!
//! The traits are defined here in `treehub-core` and implemented in the
//! satellite crates (`treehub-lock`, `treehub-storage`) or by external
//! callers (`AccessOracle`).

pub mod access;
pub mod blob;
pub mod lock;

pub use access::{AccessOp, AccessOracle};
pub use blob::{BlobStore, ByteStream};
pub use lock::LockProvider;
