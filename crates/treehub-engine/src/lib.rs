//! # treehub-engine
//!
//! The tree mutation engine: lock-guarded recursive operations over the
//! node store (create, rename, delete, copy, move, duplicate, chown),
//! name-uniqueness resolution, lazy size accounting, the access grant
//! ledger, path resolution, and the zip archive engine.
//!
//! Every mutating operation takes an explicit actor id, consults the
//! permission oracle before touching the tree, validates before locking,
//! acquires locks top-down, and releases them in reverse order on every
//! exit path. Recursive fan-outs continue past failed children and raise
//! one aggregated resource-busy error at the end; callers must not
//! assume atomicity of any multi-node operation.

pub mod access;
pub mod archive;
pub mod grants;
pub mod naming;
pub mod path;
pub mod size;
pub mod tree;

pub use access::{AllowAllOracle, GrantOracle};
pub use archive::ArchiveService;
pub use grants::GrantLedger;
pub use path::PathResolver;
pub use size::{SizeUpdateQueue, SizeUpdater};
pub use tree::TreeService;
