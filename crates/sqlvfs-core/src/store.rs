// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The node table: one SQLite row per file or directory.
//!
//! This module owns the schema, the bootstrap of the root row and every SQL
//! statement the engine runs. Tree rules (parent checks, emptiness, subtree
//! moves) live in [`crate::tree`]; the helpers here only read and write rows.
//!
//! `mod_time` is always an INTEGER holding milliseconds since the Unix epoch
//! (UTC), including the column default.

use crate::config::{JournalMode, StoreConfig};
use crate::error::{BackendContext, VfsResult};
use crate::path::{self, ROOT};
use crate::types::{NodeInfo, StoreStats};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, Span};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    parent_path TEXT NOT NULL,
    name TEXT NOT NULL,
    is_dir INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    mod_time INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)),
    content BLOB
);
CREATE INDEX IF NOT EXISTS idx_files_parent_path ON files(parent_path);
";

const NODE_COLUMNS: &str = "path, name, size, is_dir, mod_time";

/// Shared handle to the backing store.
///
/// Clones share one connection; statements from concurrent sessions are
/// serialized on its mutex, and SQLite's busy timeout covers other processes.
#[derive(Clone, Debug)]
pub struct NodeTable {
    conn: Arc<Mutex<Connection>>,
    span: Span,
}

impl NodeTable {
    /// Open (or create) the database file, apply pragmas and bootstrap.
    pub fn open(config: &StoreConfig) -> VfsResult<Self> {
        let label = config.db_path.display().to_string();
        let conn = Connection::open(&config.db_path).backend("open", &label)?;
        conn.busy_timeout(config.busy_timeout()).backend("open", &label)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", config.journal_mode.as_pragma(), |row| {
                row.get(0)
            })
            .backend("open", &label)?;
        if config.journal_mode == JournalMode::Wal {
            conn.pragma_update(None, "synchronous", "NORMAL").backend("open", &label)?;
        }
        Self::bootstrap(conn, &label, &mode)
    }

    /// Private, empty store. Used by tests and throwaway sessions.
    pub fn open_in_memory() -> VfsResult<Self> {
        let conn = Connection::open_in_memory().backend("open", ":memory:")?;
        Self::bootstrap(conn, ":memory:", "memory")
    }

    fn bootstrap(conn: Connection, label: &str, journal_mode: &str) -> VfsResult<Self> {
        let span = tracing::info_span!("store", db = %label);
        {
            let _enter = span.enter();
            conn.execute_batch(SCHEMA).backend("bootstrap", label)?;
            let created = conn
                .execute(
                    "INSERT OR IGNORE INTO files (path, parent_path, name, is_dir, size, mod_time)
                     VALUES (?1, '', ?1, 1, 0, ?2)",
                    params![ROOT, now_millis()],
                )
                .backend("bootstrap", ROOT)?;
            if created > 0 {
                info!("created root directory");
            }
            debug!(journal_mode, "store ready");
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            span,
        })
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` with exclusive use of the connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> VfsResult<T>,
    ) -> VfsResult<T> {
        // The guarded value is only the connection; a panic elsewhere leaves
        // it usable, and any open transaction was rolled back on unwind.
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn)
    }

    pub fn stats(&self) -> VfsResult<StoreStats> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_dir), 0), COALESCE(SUM(size), 0) FROM files",
                [],
                |row| {
                    let nodes: i64 = row.get(0)?;
                    let directories: i64 = row.get(1)?;
                    let content_bytes: i64 = row.get(2)?;
                    Ok(StoreStats {
                        nodes: nodes as u64,
                        directories: directories as u64,
                        files: (nodes - directories) as u64,
                        content_bytes: content_bytes as u64,
                    })
                },
            )
            .backend("stats", ROOT)
        })
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<NodeInfo> {
    let size: i64 = row.get(2)?;
    Ok(NodeInfo {
        path: row.get(0)?,
        name: row.get(1)?,
        size: size.max(0) as u64,
        is_dir: row.get(3)?,
        mod_time: from_millis(row.get(4)?),
    })
}

pub(crate) fn lookup(conn: &Connection, path: &str) -> rusqlite::Result<Option<NodeInfo>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM files WHERE path = ?1"),
        [path],
        node_from_row,
    )
    .optional()
}

/// Node metadata plus its payload. Directories carry `None`.
pub(crate) fn lookup_with_content(
    conn: &Connection,
    path: &str,
) -> rusqlite::Result<Option<(NodeInfo, Option<Vec<u8>>)>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS}, content FROM files WHERE path = ?1"),
        [path],
        |row| Ok((node_from_row(row)?, row.get(5)?)),
    )
    .optional()
}

pub(crate) fn child_count(conn: &Connection, path: &str) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM files WHERE parent_path = ?1",
        [path],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Insert a directory row or an empty file row for a canonical path.
pub(crate) fn insert_node(
    conn: &Connection,
    node_path: &str,
    is_dir: bool,
    mod_time: i64,
) -> rusqlite::Result<()> {
    let content: Option<&[u8]> = if is_dir { None } else { Some(&[]) };
    conn.execute(
        "INSERT INTO files (path, parent_path, name, is_dir, size, mod_time, content)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        params![
            node_path,
            path::parent(node_path),
            path::base_name(node_path),
            is_dir,
            mod_time,
            content
        ],
    )?;
    Ok(())
}

/// Children of `dir` ordered by name; `limit` of `None` returns all of them.
pub(crate) fn list_children(
    conn: &Connection,
    dir: &str,
    limit: Option<usize>,
) -> rusqlite::Result<Vec<NodeInfo>> {
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM files WHERE parent_path = ?1 ORDER BY name LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![dir, limit], node_from_row)?;
    rows.collect()
}

pub(crate) fn delete_node(conn: &Connection, path: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM files WHERE path = ?1", [path])
}

pub(crate) fn delete_file(conn: &Connection, path: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM files WHERE path = ?1 AND is_dir = 0", [path])
}

/// Delete `dir` and every row beneath it.
pub(crate) fn delete_subtree(conn: &Connection, dir: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM files
         WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'",
        [dir],
    )
}

/// Full-content overwrite of a file row.
pub(crate) fn write_content(
    conn: &Connection,
    path: &str,
    content: &[u8],
    mod_time: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files SET content = ?2, size = ?3, mod_time = ?4 WHERE path = ?1 AND is_dir = 0",
        params![path, content, content.len() as i64, mod_time],
    )
}

pub(crate) fn set_mod_time(conn: &Connection, path: &str, mod_time: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files SET mod_time = ?2 WHERE path = ?1",
        params![path, mod_time],
    )
}

/// Re-key a single row to `to`.
pub(crate) fn move_node(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files SET path = ?2, parent_path = ?3, name = ?4 WHERE path = ?1",
        params![from, to, path::parent(to), path::base_name(to)],
    )
}

/// Rewrite the `path` and `parent_path` prefix of every row strictly below
/// `from`. Prefix matching uses `substr` so `%` and `_` in names are literal.
pub(crate) fn move_descendants(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE files
         SET path = ?2 || substr(path, length(?1) + 1),
             parent_path = ?2 || substr(parent_path, length(?1) + 1)
         WHERE substr(path, 1, length(?1) + 1) = ?1 || '/'",
        params![from, to],
    )
}
