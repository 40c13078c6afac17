//! Site-wide sharing policy configuration.

use serde::{Deserialize, Serialize};

/// Site-wide sharing policy.
///
/// These flags feed the sharing-status precedence chain: with sharing
/// disabled every root folder resolves as private regardless of its
/// grants, and with public sharing disallowed a grant to the anonymous
/// pseudo-user is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Whether sharing between users is enabled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether root folders may be shared with the anonymous pseudo-user.
    #[serde(default = "default_true")]
    pub allow_public: bool,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            allow_public: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}
