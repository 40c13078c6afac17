//! Shared type definitions used across TreeHub crates.

pub mod id;

pub use id::{BlobId, NodeId, UserId};
