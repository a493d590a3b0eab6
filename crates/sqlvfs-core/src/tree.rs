// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory tree engine: create, remove, rename, list and stat on top of the
//! node table, enforcing the tree invariants.
//!
//! All paths taken here are already canonical (see [`crate::path::normalize`]).
//! Every mutation runs in an immediate transaction, so the checks and the
//! write see the same snapshot even with other processes on the database.

use crate::error::{BackendContext, VfsError, VfsResult};
use crate::handle::SqlFile;
use crate::path::{self, ROOT};
use crate::store::{self, NodeTable};
use crate::types::{NodeInfo, OpenFlags};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, warn};

/// Outcome of checking the would-be parent of a new node.
enum ParentState {
    Directory,
    File,
    Missing,
}

fn parent_state(conn: &Connection, node_path: &str, op: &'static str) -> VfsResult<ParentState> {
    let parent = path::parent(node_path);
    match store::lookup(conn, parent).backend(op, parent)? {
        Some(info) if info.is_dir => Ok(ParentState::Directory),
        Some(_) => Ok(ParentState::File),
        None => Ok(ParentState::Missing),
    }
}

/// The engine. Cheap to clone; clones share the node table.
#[derive(Clone, Debug)]
pub struct Tree {
    table: NodeTable,
    max_file_size: u64,
}

impl Tree {
    pub fn new(table: NodeTable, max_file_size: u64) -> Self {
        Self {
            table,
            max_file_size,
        }
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn make_dir(&self, dir: &str) -> VfsResult<()> {
        debug_assert!(path::is_canonical(dir), "non-canonical path {dir}");
        if dir == ROOT {
            return Err(VfsError::invalid("mkdir", dir, "cannot create the root"));
        }

        self.table.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .backend("mkdir", dir)?;
            match parent_state(&tx, dir, "mkdir")? {
                ParentState::Directory => {}
                ParentState::File => return Err(VfsError::already_exists(path::parent(dir))),
                ParentState::Missing => return Err(VfsError::not_found(path::parent(dir))),
            }
            if store::lookup(&tx, dir).backend("mkdir", dir)?.is_some() {
                return Err(VfsError::already_exists(dir));
            }
            store::insert_node(&tx, dir, true, store::now_millis()).map_err(|err| {
                if store::is_constraint_violation(&err) {
                    VfsError::already_exists(dir)
                } else {
                    VfsError::Backend {
                        op: "mkdir",
                        path: dir.to_string(),
                        source: err,
                    }
                }
            })?;
            tx.commit().backend("mkdir", dir)?;
            debug!(path = dir, "created directory");
            Ok(())
        })
    }

    /// Create `dir` and any missing ancestors. Existing directories along the
    /// way are accepted; an existing file along the way is not.
    pub fn make_dir_all(&self, dir: &str) -> VfsResult<()> {
        for ancestor in path::ancestors(dir) {
            match self.make_dir(ancestor) {
                Ok(()) => {}
                Err(VfsError::AlreadyExists { .. }) => {
                    // AlreadyExists also covers "parent is a file"; only a
                    // directory may stand in for the segment.
                    if !self.stat(ancestor)?.is_dir {
                        return Err(VfsError::already_exists(ancestor));
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Open (and optionally create) a node, returning a handle with a private
    /// copy of its content.
    pub fn open(&self, node_path: &str, flags: OpenFlags) -> VfsResult<SqlFile> {
        debug_assert!(path::is_canonical(node_path), "non-canonical path {node_path}");
        // Plain opens only read; they must not take the write lock.
        let behavior = if flags.create {
            TransactionBehavior::Immediate
        } else {
            TransactionBehavior::Deferred
        };
        self.table.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(behavior)
                .backend("open", node_path)?;
            let existing = store::lookup_with_content(&tx, node_path).backend("open", node_path)?;

            let handle = match existing {
                None if flags.create => {
                    if !matches!(parent_state(&tx, node_path, "open")?, ParentState::Directory) {
                        return Err(VfsError::not_found(path::parent(node_path)));
                    }
                    let now = store::now_millis();
                    store::insert_node(&tx, node_path, false, now).backend("open", node_path)?;
                    tx.commit().backend("open", node_path)?;
                    debug!(path = node_path, "created file");
                    SqlFile::file(self.clone(), node_path, Vec::new(), flags)
                }
                None => return Err(VfsError::not_found(node_path)),
                Some((info, _)) if info.is_dir => {
                    SqlFile::directory(self.clone(), node_path)
                }
                Some((info, content)) => {
                    let content = if flags.truncate {
                        Vec::new()
                    } else {
                        content.unwrap_or_default()
                    };
                    SqlFile::file(self.clone(), node_path, content, flags)
                }
            };
            Ok(handle)
        })
    }

    pub fn stat(&self, node_path: &str) -> VfsResult<NodeInfo> {
        self.table.with_conn(|conn| {
            store::lookup(conn, node_path)
                .backend("stat", node_path)?
                .ok_or_else(|| VfsError::not_found(node_path))
        })
    }

    /// Remove a file, or a directory that has no children.
    pub fn remove(&self, node_path: &str) -> VfsResult<()> {
        if node_path == ROOT {
            return Err(VfsError::invalid("remove", node_path, "cannot remove the root"));
        }

        self.table.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .backend("remove", node_path)?;
            let info = store::lookup(&tx, node_path)
                .backend("remove", node_path)?
                .ok_or_else(|| VfsError::not_found(node_path))?;
            if info.is_dir && store::child_count(&tx, node_path).backend("remove", node_path)? > 0 {
                return Err(VfsError::DirectoryNotEmpty {
                    path: node_path.to_string(),
                });
            }
            store::delete_node(&tx, node_path).backend("remove", node_path)?;
            tx.commit().backend("remove", node_path)?;
            debug!(path = node_path, is_dir = info.is_dir, "removed node");
            Ok(())
        })
    }

    /// Remove a node together with its whole subtree. A missing path is not
    /// an error.
    pub fn remove_all(&self, node_path: &str) -> VfsResult<()> {
        if node_path == ROOT {
            return Err(VfsError::invalid("remove_all", node_path, "cannot remove the root"));
        }

        self.table.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .backend("remove_all", node_path)?;
            let removed = store::delete_subtree(&tx, node_path).backend("remove_all", node_path)?;
            tx.commit().backend("remove_all", node_path)?;
            debug!(path = node_path, removed, "removed subtree");
            Ok(())
        })
    }

    /// Move a node, and for a directory its entire subtree, in one
    /// transaction. Nothing is changed unless every step succeeds.
    pub fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        if from == ROOT || to == ROOT {
            let culprit = if from == ROOT { from } else { to };
            return Err(VfsError::invalid("rename", culprit, "cannot rename the root"));
        }

        self.table.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .backend("rename", from)?;
            let info = store::lookup(&tx, from)
                .backend("rename", from)?
                .ok_or_else(|| VfsError::not_found(from))?;
            if store::lookup(&tx, to).backend("rename", to)?.is_some() {
                return Err(VfsError::already_exists(to));
            }
            if info.is_dir && path::is_within(to, from) {
                return Err(VfsError::invalid(
                    "rename",
                    to,
                    "cannot move a directory into its own subtree",
                ));
            }
            match parent_state(&tx, to, "rename")? {
                ParentState::Directory => {}
                ParentState::File => return Err(VfsError::already_exists(path::parent(to))),
                ParentState::Missing => return Err(VfsError::not_found(path::parent(to))),
            }

            store::move_node(&tx, from, to).backend("rename", from)?;
            let descendants = if info.is_dir {
                store::move_descendants(&tx, from, to).backend("rename", from)?
            } else {
                0
            };
            tx.commit().backend("rename", from)?;
            debug!(from, to, descendants, "renamed node");
            Ok(())
        })
    }

    /// Children of `dir` ordered by name, optionally capped at `limit`.
    pub fn list(&self, dir: &str, limit: Option<usize>) -> VfsResult<Vec<NodeInfo>> {
        self.table
            .with_conn(|conn| store::list_children(conn, dir, limit).backend("list", dir))
    }

    /// Set a node's modification time without touching its content.
    pub fn touch(&self, node_path: &str, mod_time: DateTime<Utc>) -> VfsResult<()> {
        self.table.with_conn(|conn| {
            let updated = store::set_mod_time(conn, node_path, store::to_millis(mod_time))
                .backend("touch", node_path)?;
            if updated == 0 {
                return Err(VfsError::not_found(node_path));
            }
            Ok(())
        })
    }

    /// Replace a file's content wholesale; returns the new modification time.
    pub(crate) fn persist(&self, node_path: &str, content: &[u8]) -> VfsResult<()> {
        let now = store::now_millis();
        self.table.with_conn(|conn| {
            let updated = store::write_content(conn, node_path, content, now)
                .backend("close", node_path)?;
            if updated == 0 {
                return Err(VfsError::not_found(node_path));
            }
            debug!(path = node_path, size = content.len(), "flushed file content");
            Ok(())
        })
    }

    /// Quota enforcement: drop the whole file node.
    pub(crate) fn discard(&self, node_path: &str) -> VfsResult<()> {
        self.table.with_conn(|conn| {
            store::delete_file(conn, node_path).backend("write", node_path)?;
            warn!(
                path = node_path,
                limit = self.max_file_size,
                "file exceeded size limit and was removed"
            );
            Ok(())
        })
    }
}
