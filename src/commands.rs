//! CLI command definitions and execution.
//!
//! The CLI is a single-user front end over the engine: the whole tree is
//! loaded from a JSON snapshot at startup and written back after a
//! successful mutating command. The permission oracle is allow-all; the
//! acting user defaults to a fixed id and can be overridden per call.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use treehub_core::config::AppConfig;
use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::types::{NodeId, UserId};
use treehub_engine::tree::Destination;
use treehub_engine::{AllowAllOracle, ArchiveService, GrantLedger, PathResolver, TreeService};
use treehub_engine::path::TreePath;
use treehub_entity::grants::GrantLevel;
use treehub_entity::node::Node;
use treehub_lock::LockManager;
use treehub_store::{MemoryNodeStore, TreeSnapshot, UsageAccountant};

use crate::output::{self, OutputFormat};

/// TreeHub — virtual hierarchical file store.
#[derive(Debug, Parser)]
#[command(name = "treehub", version, about)]
pub struct Cli {
    /// Acting user id (defaults to the single-user id).
    #[arg(long, global = true)]
    pub actor: Option<UserId>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands. Node addressing uses structured paths of the form
/// `scheme://owner/root/seg/...` (e.g. `private:///Documents/notes`).
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List root folders, or the children of a path.
    Ls {
        /// Path to list; omit for the actor's root folders.
        path: Option<String>,
    },
    /// Create a folder (or a root folder for a single-segment path).
    Mkdir {
        /// Path of the folder to create.
        path: String,
        /// Auto-rename instead of failing on a name collision.
        #[arg(long)]
        rename: bool,
    },
    /// Upload a local file under a folder path.
    Put {
        /// Destination folder path.
        path: String,
        /// Local file to upload.
        file: PathBuf,
        /// MIME type recorded on the node.
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        /// Auto-rename instead of failing on a name collision.
        #[arg(long)]
        rename: bool,
    },
    /// Rename a node in place.
    Rename {
        /// Path of the node.
        path: String,
        /// The new name.
        name: String,
    },
    /// Delete a node and its subtree.
    Rm {
        /// Path of the node.
        path: String,
        /// Bypass locking and usage accounting (administrative wipe).
        #[arg(long)]
        fast: bool,
    },
    /// Move a node into another folder, or promote it to a root folder.
    Mv {
        /// Source path.
        src: String,
        /// Destination folder path; omit with --to-root.
        dest: Option<String>,
        /// Move to the actor's root-folder list.
        #[arg(long, conflicts_with = "dest")]
        to_root: bool,
    },
    /// Copy a node (and its subtree) into another folder.
    Cp {
        /// Source path.
        src: String,
        /// Destination folder path.
        dest: String,
        /// Auto-rename instead of failing on a name collision.
        #[arg(long)]
        rename: bool,
    },
    /// Duplicate a node next to itself.
    Dup {
        /// Path of the node.
        path: String,
    },
    /// Transfer ownership of a node.
    Chown {
        /// Path of the node.
        path: String,
        /// The new owner's user id.
        owner: UserId,
        /// Reassign the whole subtree.
        #[arg(short, long)]
        recursive: bool,
    },
    /// Compress direct children of a folder into a zip archive.
    Zip {
        /// Parent folder path.
        path: String,
        /// Archive name (`.zip` is appended when missing).
        name: String,
        /// Names of the children to include.
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Extract a zip archive node into a folder.
    Unzip {
        /// Path of the archive file node.
        path: String,
        /// Destination folder path; defaults to the archive's parent.
        dest: Option<String>,
    },
    /// Show a user's usage counters.
    Usage {
        /// User id; defaults to the actor.
        user: Option<UserId>,
    },
    /// Resolve a path and show the node behind it.
    Resolve {
        /// Path to resolve.
        path: String,
    },
    /// Manage sharing grants on a root folder.
    Share {
        /// Path of the root folder.
        path: String,
        #[command(subcommand)]
        action: ShareAction,
    },
}

/// Sharing subcommands.
#[derive(Debug, Subcommand)]
pub enum ShareAction {
    /// Grant a level to a user.
    Grant {
        /// The user to grant to.
        user: UserId,
        /// The grant level.
        #[arg(value_enum)]
        level: CliGrantLevel,
    },
    /// Revoke a level from a user.
    Revoke {
        /// The user to revoke from.
        user: UserId,
        /// The grant level.
        #[arg(value_enum)]
        level: CliGrantLevel,
    },
    /// Show the effective sharing status.
    Status,
}

/// Grant levels as CLI values.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliGrantLevel {
    View,
    Author,
    Disabled,
}

impl From<CliGrantLevel> for GrantLevel {
    fn from(level: CliGrantLevel) -> Self {
        match level {
            CliGrantLevel::View => GrantLevel::View,
            CliGrantLevel::Author => GrantLevel::Author,
            CliGrantLevel::Disabled => GrantLevel::Disabled,
        }
    }
}

/// Everything a command needs, wired from configuration and the
/// snapshot.
struct AppContext {
    store: Arc<MemoryNodeStore>,
    usage: Arc<UsageAccountant>,
    tree: Arc<TreeService>,
    archives: ArchiveService,
    ledger: GrantLedger,
    resolver: PathResolver,
    snapshot_path: PathBuf,
}

impl AppContext {
    async fn build(config: AppConfig) -> AppResult<Self> {
        let store = Arc::new(MemoryNodeStore::new());
        let usage = Arc::new(UsageAccountant::new());
        let snapshot_path = PathBuf::from(&config.storage.snapshot_path);
        TreeSnapshot::read(&snapshot_path)
            .await?
            .restore(&store, &usage);

        let blobs = treehub_storage::from_config(&config.storage).await?;
        let locks = LockManager::new(&config.lock);
        let oracle = Arc::new(AllowAllOracle);
        let tree = Arc::new(TreeService::new(
            store.clone(),
            locks.clone(),
            usage.clone(),
            blobs,
            oracle.clone(),
        ));
        let archives = ArchiveService::new(tree.clone(), config.archive.clone(), &config.storage);
        let ledger = GrantLedger::new(store.clone(), locks, oracle, config.sharing.clone());
        let resolver = PathResolver::new(store.clone(), Arc::new(|_| None));
        Ok(Self {
            store,
            usage,
            tree,
            archives,
            ledger,
            resolver,
            snapshot_path,
        })
    }

    async fn save(&self) -> AppResult<()> {
        TreeSnapshot::capture(&self.store, &self.usage)
            .write(&self.snapshot_path)
            .await
    }

    async fn resolve(&self, actor: UserId, path: &str) -> AppResult<Node> {
        let parsed = TreePath::parse(path)?;
        self.resolver.resolve_parsed(actor, &parsed).await
    }

    /// Split a path into its parent node (none for a root-level path)
    /// and the final segment name.
    async fn resolve_parent(
        &self,
        actor: UserId,
        path: &str,
    ) -> AppResult<(Option<NodeId>, String)> {
        let mut parsed = TreePath::parse(path)?;
        let name = parsed
            .segments
            .pop()
            .ok_or_else(|| AppError::validation(format!("empty path: '{path}'")))?;
        if parsed.segments.is_empty() {
            return Ok((None, name));
        }
        let parent = self.resolver.resolve_parsed(actor, &parsed).await?;
        Ok((Some(parent.id), name))
    }
}

/// A node as displayed by `ls` and `resolve`.
#[derive(Debug, Serialize, Tabled)]
struct NodeRow {
    /// Node id.
    id: String,
    /// Kind.
    kind: String,
    /// Name.
    name: String,
    /// Size in bytes, or `-` when unset.
    size: String,
    /// Owner id.
    owner: String,
    /// Last change.
    changed: String,
}

impl From<&Node> for NodeRow {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            kind: format!("{:?}", node.kind()).to_lowercase(),
            name: node.name.clone(),
            size: node.size.map_or_else(|| "-".to_string(), |s| s.to_string()),
            owner: node.owner.to_string(),
            changed: node.changed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Usage counters as displayed by `usage`.
#[derive(Debug, Serialize, Tabled)]
struct UsageRow {
    /// User id.
    user: String,
    /// Owned root folders.
    root_folders: i64,
    /// Owned folders.
    folders: i64,
    /// Owned files.
    files: i64,
    /// Owned bytes.
    bytes: i64,
}

impl Cli {
    /// The fixed single-user id used when `--actor` is not given.
    fn default_actor() -> UserId {
        UserId::from_uuid(Uuid::from_u128(1))
    }

    /// Execute the parsed command.
    pub async fn execute(self, config: AppConfig) -> AppResult<()> {
        let ctx = AppContext::build(config).await?;
        let actor = self.actor.unwrap_or_else(Self::default_actor);
        let format = self.format;

        let mutated = match self.command {
            Commands::Ls { path } => {
                let nodes = match path {
                    Some(path) => {
                        let node = ctx.resolve(actor, &path).await?;
                        ctx.tree.list_children(actor, node.id).await?
                    }
                    None => ctx.tree.list_roots(actor).await?,
                };
                let rows: Vec<NodeRow> = nodes.iter().map(NodeRow::from).collect();
                output::print_list(&rows, format);
                false
            }
            Commands::Mkdir { path, rename } => {
                let (parent, name) = ctx.resolve_parent(actor, &path).await?;
                let node = ctx.tree.create_folder(actor, parent, &name, rename).await?;
                output::print_item(&NodeRow::from(&node), format);
                true
            }
            Commands::Put {
                path,
                file,
                mime,
                rename,
            } => {
                let parent = ctx.resolve(actor, &path).await?;
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| AppError::validation("file has no usable name"))?
                    .to_string();
                let data = tokio::fs::read(&file).await?;
                let node = ctx
                    .tree
                    .add_file(actor, parent.id, &name, &mime, data.into(), rename)
                    .await?;
                output::print_item(&NodeRow::from(&node), format);
                true
            }
            Commands::Rename { path, name } => {
                let node = ctx.resolve(actor, &path).await?;
                let renamed = ctx.tree.rename(actor, node.id, &name).await?;
                output::print_item(&NodeRow::from(&renamed), format);
                true
            }
            Commands::Rm { path, fast } => {
                let node = ctx.resolve(actor, &path).await?;
                let result = ctx.tree.delete(actor, node.id, fast).await;
                // A partial delete still changed the tree; persist it
                // before reporting.
                ctx.save().await?;
                result?;
                println!("Deleted.");
                false
            }
            Commands::Mv { src, dest, to_root } => {
                let node = ctx.resolve(actor, &src).await?;
                let destination = match (dest, to_root) {
                    (Some(dest), _) => {
                        Destination::Folder(ctx.resolve(actor, &dest).await?.id)
                    }
                    (None, true) => Destination::RootList,
                    (None, false) => {
                        return Err(AppError::validation(
                            "a destination path or --to-root is required",
                        ));
                    }
                };
                let moved = ctx.tree.move_node(actor, node.id, destination).await?;
                output::print_item(&NodeRow::from(&moved), format);
                true
            }
            Commands::Cp { src, dest, rename } => {
                let node = ctx.resolve(actor, &src).await?;
                let dest = ctx.resolve(actor, &dest).await?;
                let result = ctx
                    .tree
                    .copy(actor, node.id, Destination::Folder(dest.id), rename)
                    .await;
                ctx.save().await?;
                let copy = result?;
                output::print_item(&NodeRow::from(&copy), format);
                false
            }
            Commands::Dup { path } => {
                let node = ctx.resolve(actor, &path).await?;
                let copy = ctx.tree.duplicate(actor, node.id).await?;
                output::print_item(&NodeRow::from(&copy), format);
                true
            }
            Commands::Chown {
                path,
                owner,
                recursive,
            } => {
                let node = ctx.resolve(actor, &path).await?;
                let result = if recursive {
                    ctx.tree.chown_recursive(actor, node.id, owner).await
                } else {
                    ctx.tree.chown(actor, node.id, owner).await.map(|_| ())
                };
                ctx.save().await?;
                result?;
                println!("Ownership transferred to {owner}.");
                false
            }
            Commands::Zip { path, name, items } => {
                let parent = ctx.resolve(actor, &path).await?;
                let children = ctx.store.children(parent.id).await?;
                let mut selection = Vec::with_capacity(items.len());
                for item in &items {
                    let child = children.iter().find(|c| &c.name == item).ok_or_else(|| {
                        AppError::not_found(format!("no child named '{item}'"))
                    })?;
                    selection.push(child.id);
                }
                let archive = ctx
                    .archives
                    .compress(actor, parent.id, &selection, &name)
                    .await?;
                output::print_item(&NodeRow::from(&archive), format);
                true
            }
            Commands::Unzip { path, dest } => {
                let archive = ctx.resolve(actor, &path).await?;
                let dest = match dest {
                    Some(dest) => Some(ctx.resolve(actor, &dest).await?.id),
                    None => None,
                };
                let result = ctx.archives.extract(actor, archive.id, dest).await;
                ctx.save().await?;
                let landed = result?;
                output::print_item(&NodeRow::from(&landed), format);
                false
            }
            Commands::Usage { user } => {
                let user = user.unwrap_or(actor);
                let counters = ctx.usage.get_usage(user).await?;
                let row = UsageRow {
                    user: user.to_string(),
                    root_folders: counters.root_folders,
                    folders: counters.folders,
                    files: counters.files,
                    bytes: counters.bytes,
                };
                output::print_item(&row, format);
                false
            }
            Commands::Resolve { path } => {
                let node = ctx.resolve(actor, &path).await?;
                output::print_item(&NodeRow::from(&node), format);
                false
            }
            Commands::Share { path, action } => {
                let node = ctx.resolve(actor, &path).await?;
                match action {
                    ShareAction::Grant { user, level } => {
                        let changed = ctx
                            .ledger
                            .grant(actor, node.id, user, level.into())
                            .await?;
                        println!("{}", if changed { "Granted." } else { "No change." });
                    }
                    ShareAction::Revoke { user, level } => {
                        let changed = ctx
                            .ledger
                            .revoke(actor, node.id, user, level.into())
                            .await?;
                        println!("{}", if changed { "Revoked." } else { "No change." });
                    }
                    ShareAction::Status => {
                        let status = ctx.ledger.sharing_status(node.id).await?;
                        println!("{status:?}");
                    }
                }
                true
            }
        };

        if mutated {
            ctx.save().await?;
        }
        Ok(())
    }
}
