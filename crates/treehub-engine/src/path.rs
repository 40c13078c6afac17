//! Structured path resolution.
//!
//! Paths take the form `scheme://ownerSpec/seg1/seg2/...`. The scheme
//! selects which visibility class of root folders is searched, the owner
//! spec narrows the search to one user (absent, a user uuid, or an
//! account name resolved through a caller-supplied lookup), and the
//! segments walk down by child name. This is the only surface that
//! addresses nodes by human-readable name rather than id.

use std::str::FromStr;
use std::sync::Arc;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::node::Node;
use treehub_store::MemoryNodeStore;

/// Account-name-to-user lookup supplied by the surrounding application.
pub type AccountResolver = Arc<dyn Fn(&str) -> Option<UserId> + Send + Sync>;

/// The visibility class of root folders a path searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Roots owned by one user, regardless of sharing.
    Private,
    /// Roots granted to the anonymous pseudo-user.
    Public,
    /// Roots shared with at least one other user.
    Shared,
}

impl FromStr for Scheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            "shared" => Ok(Self::Shared),
            other => Err(AppError::validation(format!("unknown path scheme: '{other}'"))),
        }
    }
}

/// Who a path's root-folder search belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSpec {
    /// No owner given; the scheme decides the default.
    Default,
    /// An explicit user id.
    Id(UserId),
    /// An account name, resolved through the [`AccountResolver`].
    Account(String),
}

/// A parsed (but not yet resolved) path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePath {
    /// The visibility class searched.
    pub scheme: Scheme,
    /// The owner restriction.
    pub owner: OwnerSpec,
    /// Name segments, root folder first. Never empty.
    pub segments: Vec<String>,
}

impl TreePath {
    /// Parse `scheme://ownerSpec/seg1/...`. The owner spec may be empty
    /// (`private:///Documents`); empty intermediate segments are
    /// malformed.
    pub fn parse(path: &str) -> AppResult<Self> {
        let (scheme_str, rest) = path.split_once("://").ok_or_else(|| {
            AppError::validation(format!("malformed path (missing '://'): '{path}'"))
        })?;
        let scheme: Scheme = scheme_str.parse()?;

        let (owner_str, segments_str) = match rest.split_once('/') {
            Some(parts) => parts,
            None => {
                return Err(AppError::validation(format!(
                    "malformed path (no segments after owner): '{path}'"
                )));
            }
        };
        let owner = if owner_str.is_empty() {
            OwnerSpec::Default
        } else if let Ok(uuid) = uuid::Uuid::parse_str(owner_str) {
            OwnerSpec::Id(UserId::from(uuid))
        } else {
            OwnerSpec::Account(owner_str.to_string())
        };

        let segments: Vec<String> = segments_str
            .trim_end_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(AppError::validation(format!(
                "malformed path (empty segment): '{path}'"
            )));
        }
        Ok(Self {
            scheme,
            owner,
            segments,
        })
    }
}

/// Resolves parsed paths against the node store.
pub struct PathResolver {
    store: Arc<MemoryNodeStore>,
    accounts: AccountResolver,
}

impl PathResolver {
    /// Create a resolver. The account lookup maps human account names to
    /// user ids; a resolver that always returns `None` disables
    /// account-name owner specs.
    pub fn new(store: Arc<MemoryNodeStore>, accounts: AccountResolver) -> Self {
        Self { store, accounts }
    }

    /// Resolve a path string to a node id on behalf of `actor`.
    pub async fn resolve(&self, actor: UserId, path: &str) -> AppResult<NodeId> {
        let parsed = TreePath::parse(path)?;
        let node = self.resolve_parsed(actor, &parsed).await?;
        Ok(node.id)
    }

    /// Resolve a parsed path to the full node.
    pub async fn resolve_parsed(&self, actor: UserId, path: &TreePath) -> AppResult<Node> {
        let owner = match &path.owner {
            OwnerSpec::Id(id) => Some(*id),
            OwnerSpec::Account(name) => Some((self.accounts)(name).ok_or_else(|| {
                AppError::validation(format!("unknown account: '{name}'"))
            })?),
            OwnerSpec::Default => match path.scheme {
                Scheme::Private => Some(actor),
                // Public and shared roots are searched across all owners.
                Scheme::Public | Scheme::Shared => None,
            },
        };

        let root_name = &path.segments[0];
        let candidates: Vec<Node> = self
            .store
            .roots(owner, Some(root_name))
            .await?
            .into_iter()
            .filter(|root| match path.scheme {
                Scheme::Private => true,
                Scheme::Public => root.grants().is_some_and(|g| g.is_public()),
                Scheme::Shared => root.grants().is_some_and(|g| !g.is_private()),
            })
            .collect();
        if candidates.len() > 1 {
            return Err(AppError::validation(format!(
                "root folder name '{root_name}' is ambiguous ({} owners match)",
                candidates.len()
            )));
        }
        let root = candidates.into_iter().next().ok_or_else(|| {
            AppError::not_found(format!("no matching root folder: '{root_name}'"))
        })?;

        let mut current = root;
        for segment in &path.segments[1..] {
            if !current.is_folder_like() {
                return Err(AppError::validation(format!(
                    "'{}' is not a folder",
                    current.name
                )));
            }
            let children = self.store.children(current.id).await?;
            current = children
                .into_iter()
                .find(|c| &c.name == segment)
                .ok_or_else(|| {
                    AppError::not_found(format!("path segment not found: '{segment}'"))
                })?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_entity::grants::GrantLevel;

    fn no_accounts() -> AccountResolver {
        Arc::new(|_| None)
    }

    #[test]
    fn test_parse_full_form() {
        let path = TreePath::parse("private://alice/Documents/notes.txt").unwrap();
        assert_eq!(path.scheme, Scheme::Private);
        assert_eq!(path.owner, OwnerSpec::Account("alice".to_string()));
        assert_eq!(path.segments, vec!["Documents", "notes.txt"]);
    }

    #[test]
    fn test_parse_default_owner_and_uuid_owner() {
        let path = TreePath::parse("private:///Documents").unwrap();
        assert_eq!(path.owner, OwnerSpec::Default);

        let user = UserId::new();
        let path = TreePath::parse(&format!("shared://{user}/Stuff")).unwrap();
        assert_eq!(path.owner, OwnerSpec::Id(user));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TreePath::parse("Documents/notes.txt").is_err());
        assert!(TreePath::parse("ftp://x/Documents").is_err());
        assert!(TreePath::parse("private://alice").is_err());
        assert!(TreePath::parse("private://alice//gap").is_err());
    }

    #[tokio::test]
    async fn test_resolve_private_path() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let root = Node::new_root("Documents", owner);
        let folder = Node::new_folder("2026", owner, &root);
        store.save(&root).await.unwrap();
        store.save(&folder).await.unwrap();

        let resolver = PathResolver::new(store, no_accounts());
        let id = resolver
            .resolve(owner, "private:///Documents/2026")
            .await
            .unwrap();
        assert_eq!(id, folder.id);

        let err = resolver
            .resolve(owner, "private:///Documents/2027")
            .await
            .unwrap_err();
        assert_eq!(err.kind, treehub_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_public_scheme_requires_public_grant() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let mut open = Node::new_root("Open", owner);
        open.grants_mut()
            .unwrap()
            .grant(owner, UserId::ANONYMOUS, GrantLevel::View);
        let closed = Node::new_root("Closed", owner);
        store.save(&open).await.unwrap();
        store.save(&closed).await.unwrap();

        let resolver = PathResolver::new(store, no_accounts());
        let visitor = UserId::new();
        assert_eq!(
            resolver.resolve(visitor, "public:///Open/").await.unwrap(),
            open.id
        );
        assert!(resolver.resolve(visitor, "public:///Closed/").await.is_err());
    }

    #[tokio::test]
    async fn test_ambiguous_root_name_across_owners() {
        let store = Arc::new(MemoryNodeStore::new());
        let reader = UserId::new();
        for _ in 0..2 {
            let owner = UserId::new();
            let mut root = Node::new_root("Team", owner);
            root.grants_mut()
                .unwrap()
                .grant(owner, reader, GrantLevel::View);
            store.save(&root).await.unwrap();
        }

        let resolver = PathResolver::new(store, no_accounts());
        let err = resolver.resolve(reader, "shared:///Team/").await.unwrap_err();
        assert_eq!(err.kind, treehub_core::error::ErrorKind::Validation);
        assert!(err.message.contains("ambiguous"));
    }

    #[tokio::test]
    async fn test_account_resolver_narrows_owner() {
        let store = Arc::new(MemoryNodeStore::new());
        let alice = UserId::new();
        let root = Node::new_root("Documents", alice);
        store.save(&root).await.unwrap();

        let accounts: AccountResolver = Arc::new(move |name| {
            if name == "alice" {
                Some(alice)
            } else {
                None
            }
        });
        let resolver = PathResolver::new(store, accounts);
        assert_eq!(
            resolver
                .resolve(UserId::new(), "private://alice/Documents")
                .await
                .unwrap(),
            root.id
        );
        let err = resolver
            .resolve(UserId::new(), "private://bob/Documents")
            .await
            .unwrap_err();
        assert!(err.message.contains("unknown account"));
    }
}
