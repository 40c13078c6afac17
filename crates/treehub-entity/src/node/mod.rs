//! Tree node entity.

pub mod model;
pub mod name;

pub use model::{Node, NodeKind, NodePayload};
pub use name::{MAX_NAME_CHARS, validate_name};
