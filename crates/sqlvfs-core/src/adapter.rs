// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The per-session filesystem capability set handed to a protocol engine.

use crate::error::VfsResult;
use crate::handle::{SqlFile, VfsFile};
use crate::path;
use crate::tree::Tree;
use crate::types::{NodeInfo, OpenFlags};
use chrono::{DateTime, Utc};
use tracing::{debug, Span};

/// Identifier reported by [`Filesystem::name`].
pub const ADAPTER_NAME: &str = "sqlite-vfs";

/// Filesystem operations available to one session.
///
/// Paths are client-supplied and normalized by the implementation.
pub trait Filesystem: Send + Sync {
    type File: VfsFile;

    fn name(&self) -> &str;

    /// Open for read/write, creating the file if needed and discarding any
    /// existing content.
    fn create(&self, path: &str) -> VfsResult<Self::File>;

    fn mkdir(&self, path: &str) -> VfsResult<()>;

    fn mkdir_all(&self, path: &str) -> VfsResult<()>;

    /// Open read-only.
    fn open(&self, path: &str) -> VfsResult<Self::File>;

    fn open_file(&self, path: &str, flags: OpenFlags) -> VfsResult<Self::File>;

    fn remove(&self, path: &str) -> VfsResult<()>;

    fn remove_all(&self, path: &str) -> VfsResult<()>;

    fn rename(&self, old: &str, new: &str) -> VfsResult<()>;

    fn stat(&self, path: &str) -> VfsResult<NodeInfo>;

    /// Accepted and ignored; there is no permission model.
    fn chmod(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Accepted and ignored; there is no ownership model.
    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()>;

    fn chtimes(&self, path: &str, mod_time: DateTime<Utc>) -> VfsResult<()>;
}

/// [`Filesystem`] backed by the SQLite node table.
#[derive(Clone)]
pub struct SqlFs {
    tree: Tree,
    span: Span,
}

impl SqlFs {
    /// Wrap a tree. Operations are recorded under `span`.
    pub fn new(tree: Tree, span: Span) -> Self {
        Self { tree, span }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }
}

impl Filesystem for SqlFs {
    type File = SqlFile;

    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    fn create(&self, path: &str) -> VfsResult<SqlFile> {
        self.open_file(path, OpenFlags::create_truncate())
    }

    fn mkdir(&self, path: &str) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.make_dir(&path::normalize(path))
    }

    fn mkdir_all(&self, path: &str) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.make_dir_all(&path::normalize(path))
    }

    fn open(&self, path: &str) -> VfsResult<SqlFile> {
        self.open_file(path, OpenFlags::read_only())
    }

    fn open_file(&self, path: &str, flags: OpenFlags) -> VfsResult<SqlFile> {
        let _enter = self.span.enter();
        let path = path::normalize(path);
        debug!(path = %path, ?flags, "open");
        self.tree.open(&path, flags)
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.remove(&path::normalize(path))
    }

    fn remove_all(&self, path: &str) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.remove_all(&path::normalize(path))
    }

    fn rename(&self, old: &str, new: &str) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.rename(&path::normalize(old), &path::normalize(new))
    }

    fn stat(&self, path: &str) -> VfsResult<NodeInfo> {
        self.tree.stat(&path::normalize(path))
    }

    fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let _enter = self.span.enter();
        debug!(path, mode, "chmod ignored");
        Ok(())
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        let _enter = self.span.enter();
        debug!(path, uid, gid, "chown ignored");
        Ok(())
    }

    fn chtimes(&self, path: &str, mod_time: DateTime<Utc>) -> VfsResult<()> {
        let _enter = self.span.enter();
        self.tree.touch(&path::normalize(path), mod_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::NodeTable;

    fn fs() -> SqlFs {
        let tree = Tree::new(NodeTable::open_in_memory().unwrap(), 1024);
        SqlFs::new(tree, Span::none())
    }

    #[test]
    fn reports_fixed_name() {
        assert_eq!(fs().name(), "sqlite-vfs");
    }

    #[test]
    fn client_paths_are_normalized() {
        let fs = fs();
        fs.mkdir("docs/").unwrap();
        let mut f = fs.create("//docs/./notes/../readme.txt").unwrap();
        f.write_string("hi").unwrap();
        f.close().unwrap();

        let info = fs.stat("/docs/readme.txt").unwrap();
        assert_eq!(info.size, 2);
        assert_eq!(info.name, "readme.txt");
        assert!(fs.stat("docs/../docs").unwrap().is_dir);
    }

    #[test]
    fn open_missing_without_create_fails() {
        let fs = fs();
        assert_eq!(fs.open("/nope").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(fs.create("/missing/f").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn chmod_and_chown_are_accepted() {
        let fs = fs();
        fs.chmod("/whatever", 0o600).unwrap();
        fs.chown("/", 1000, 1000).unwrap();
    }

    #[test]
    fn chtimes_updates_mod_time() {
        let fs = fs();
        fs.mkdir("/d").unwrap();
        let when = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        fs.chtimes("/d", when).unwrap();
        assert_eq!(fs.stat("/d").unwrap().mod_time, when);
        assert_eq!(fs.chtimes("/gone", when).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn remove_all_tolerates_missing() {
        let fs = fs();
        fs.mkdir_all("/a/b").unwrap();
        fs.remove_all("a").unwrap();
        fs.remove_all("a").unwrap();
        assert_eq!(fs.remove_all("/").unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert_eq!(fs.remove("/").unwrap_err().kind(), ErrorKind::InvalidOperation);
    }
}
