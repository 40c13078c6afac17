//! Per-root-folder access grants.
//!
//! Every root folder carries three disjoint user-id sets: view, author,
//! and disabled. The owner always has implicit view+author access; the
//! owner is never stored in the sets and never revocable. Granting view
//! or author removes a user from disabled and vice versa.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use treehub_core::config::sharing::SharingConfig;
use treehub_core::types::UserId;

/// An access level a user can hold on a root folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantLevel {
    /// Read-only access to the tree.
    View,
    /// Read-write access to the tree. Implies view when queried.
    Author,
    /// Explicitly blocked, overriding nothing else (informational set).
    Disabled,
}

/// The resolved sharing state of a root folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingStatus {
    /// Only the owner can see the tree.
    Private,
    /// The anonymous pseudo-user (and thus everyone) can see the tree.
    Public,
    /// One or more specific non-owner users can see the tree.
    Shared,
}

/// The view/author/disabled grant sets of a root folder.
///
/// Uses `BTreeSet` so snapshots serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSet {
    /// Users with read-only access.
    pub view: BTreeSet<UserId>,
    /// Users with read-write access.
    pub author: BTreeSet<UserId>,
    /// Users explicitly disabled.
    pub disabled: BTreeSet<UserId>,
}

impl GrantSet {
    /// An empty grant set (the owner's implicit access always applies).
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `user` the given level. Adding to view or author removes the
    /// user from disabled; disabling removes from view and author. The
    /// owner's implicit access is never stored, so granting the owner is
    /// a no-op. Returns whether the sets changed.
    pub fn grant(&mut self, owner: UserId, user: UserId, level: GrantLevel) -> bool {
        if user == owner {
            return false;
        }
        match level {
            GrantLevel::View => {
                let added = self.view.insert(user);
                self.disabled.remove(&user) || added
            }
            GrantLevel::Author => {
                let added = self.author.insert(user);
                self.disabled.remove(&user) || added
            }
            GrantLevel::Disabled => {
                let added = self.disabled.insert(user);
                let removed = self.view.remove(&user) | self.author.remove(&user);
                removed || added
            }
        }
    }

    /// Revoke `user`'s membership of the given level. The owner is never
    /// revocable. Returns whether the sets changed.
    pub fn revoke(&mut self, owner: UserId, user: UserId, level: GrantLevel) -> bool {
        if user == owner {
            return false;
        }
        match level {
            GrantLevel::View => self.view.remove(&user),
            GrantLevel::Author => self.author.remove(&user),
            GrantLevel::Disabled => self.disabled.remove(&user),
        }
    }

    /// Whether `user` holds the given level. The owner implicitly holds
    /// view and author; author membership implies view.
    pub fn is_granted(&self, owner: UserId, user: UserId, level: GrantLevel) -> bool {
        match level {
            GrantLevel::View => {
                user == owner || self.view.contains(&user) || self.author.contains(&user)
            }
            GrantLevel::Author => user == owner || self.author.contains(&user),
            GrantLevel::Disabled => self.disabled.contains(&user),
        }
    }

    /// Whether no non-owner user holds view or author access.
    pub fn is_private(&self) -> bool {
        self.view.is_empty() && self.author.is_empty()
    }

    /// Whether the anonymous pseudo-user holds view or author access.
    pub fn is_public(&self) -> bool {
        self.view.contains(&UserId::ANONYMOUS) || self.author.contains(&UserId::ANONYMOUS)
    }

    /// Whether the only non-owner grants are to the anonymous pseudo-user.
    fn only_anonymous_granted(&self) -> bool {
        self.view
            .iter()
            .chain(self.author.iter())
            .all(|u| u.is_anonymous())
    }

    /// Resolve the sharing status of a root folder with these grants,
    /// applying the site-wide policy precedence chain.
    pub fn sharing_status(&self, owner: UserId, config: &SharingConfig) -> SharingStatus {
        if !config.enabled {
            return SharingStatus::Private;
        }
        if owner.is_anonymous() {
            return SharingStatus::Public;
        }
        if self.is_private() {
            return SharingStatus::Private;
        }
        if config.allow_public && self.is_public() {
            return SharingStatus::Public;
        }
        if !config.allow_public && self.only_anonymous_granted() {
            return SharingStatus::Private;
        }
        SharingStatus::Shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, allow_public: bool) -> SharingConfig {
        SharingConfig {
            enabled,
            allow_public,
        }
    }

    #[test]
    fn test_grant_removes_from_disabled() {
        let owner = UserId::new();
        let user = UserId::new();
        let mut grants = GrantSet::new();
        grants.grant(owner, user, GrantLevel::Disabled);
        assert!(grants.is_granted(owner, user, GrantLevel::Disabled));

        grants.grant(owner, user, GrantLevel::View);
        assert!(!grants.is_granted(owner, user, GrantLevel::Disabled));
        assert!(grants.is_granted(owner, user, GrantLevel::View));
    }

    #[test]
    fn test_disable_removes_view_and_author() {
        let owner = UserId::new();
        let user = UserId::new();
        let mut grants = GrantSet::new();
        grants.grant(owner, user, GrantLevel::View);
        grants.grant(owner, user, GrantLevel::Author);
        grants.grant(owner, user, GrantLevel::Disabled);
        assert!(grants.view.is_empty());
        assert!(grants.author.is_empty());
        assert!(grants.is_granted(owner, user, GrantLevel::Disabled));
    }

    #[test]
    fn test_author_implies_view() {
        let owner = UserId::new();
        let user = UserId::new();
        let mut grants = GrantSet::new();
        grants.grant(owner, user, GrantLevel::Author);
        assert!(grants.is_granted(owner, user, GrantLevel::View));
    }

    #[test]
    fn test_owner_implicit_and_irrevocable() {
        let owner = UserId::new();
        let mut grants = GrantSet::new();
        assert!(grants.is_granted(owner, owner, GrantLevel::Author));
        assert!(!grants.grant(owner, owner, GrantLevel::Disabled));
        assert!(!grants.revoke(owner, owner, GrantLevel::View));
        assert!(grants.is_granted(owner, owner, GrantLevel::View));
    }

    #[test]
    fn test_sharing_status_precedence() {
        let owner = UserId::new();
        let user = UserId::new();
        let mut grants = GrantSet::new();

        // Site-wide sharing disabled wins over everything.
        grants.grant(owner, user, GrantLevel::View);
        assert_eq!(
            grants.sharing_status(owner, &config(false, true)),
            SharingStatus::Private
        );

        // Anonymous owner is public regardless of grants.
        assert_eq!(
            GrantSet::new().sharing_status(UserId::ANONYMOUS, &config(true, true)),
            SharingStatus::Public
        );

        // No grants beyond the owner: private.
        assert_eq!(
            GrantSet::new().sharing_status(owner, &config(true, true)),
            SharingStatus::Private
        );

        // Anonymous granted and public sharing allowed: public.
        let mut pub_grants = GrantSet::new();
        pub_grants.grant(owner, UserId::ANONYMOUS, GrantLevel::View);
        assert_eq!(
            pub_grants.sharing_status(owner, &config(true, true)),
            SharingStatus::Public
        );

        // Public sharing disallowed and only anonymous granted: private.
        assert_eq!(
            pub_grants.sharing_status(owner, &config(true, false)),
            SharingStatus::Private
        );

        // A real user granted: shared.
        assert_eq!(
            grants.sharing_status(owner, &config(true, true)),
            SharingStatus::Shared
        );
    }
}
