// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File handles.
//!
//! A handle owns a private copy of the file's content. Nothing is written to
//! the node table until [`VfsFile::close`], which overwrites the stored
//! content in full. Two handles on the same path never see each other's
//! buffers, and whichever closes last determines the stored content.

use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::tree::Tree;
use crate::types::{NodeInfo, OpenFlags};
use std::io::{self, SeekFrom};
use tracing::{debug, warn, Span};

/// Operations a protocol engine may perform on an open node.
pub trait VfsFile: Send {
    /// Copy bytes from the cursor into `buf`. `Ok(0)` signals end of file.
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Like [`VfsFile::read`] from an explicit offset; the cursor is untouched.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> VfsResult<usize>;

    /// Write at the cursor, growing the buffer as needed.
    ///
    /// If the result would exceed the maximum file size the file node is
    /// deleted from the store, the handle is discarded and
    /// [`VfsError::StorageExceeded`] is returned. Prior content is lost.
    fn write(&mut self, data: &[u8]) -> VfsResult<usize>;

    /// Positional writes are not supported.
    fn write_at(&mut self, data: &[u8], offset: u64) -> VfsResult<usize>;

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;

    /// Persist the buffer (for handles opened with write intent) and release
    /// the handle. Calling it again is a no-op.
    fn close(&mut self) -> VfsResult<()>;

    /// Children of a directory handle; `limit == 0` returns all of them.
    fn readdir(&mut self, limit: usize) -> VfsResult<Vec<NodeInfo>>;

    fn readdirnames(&mut self, limit: usize) -> VfsResult<Vec<String>> {
        Ok(self.readdir(limit)?.into_iter().map(|n| n.name).collect())
    }

    /// Metadata as currently stored; unsaved writes are not reflected.
    fn stat(&self) -> VfsResult<NodeInfo>;

    /// Content only reaches the store on close; this never does anything.
    fn sync(&mut self) -> VfsResult<()>;

    fn truncate(&mut self, size: i64) -> VfsResult<()>;

    fn write_string(&mut self, s: &str) -> VfsResult<usize> {
        self.write(s.as_bytes())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandleState {
    Open,
    Closed,
    /// The node was deleted by quota enforcement.
    Discarded,
}

/// Handle over one node of a [`Tree`].
#[derive(Debug)]
pub struct SqlFile {
    tree: Tree,
    path: String,
    buf: Vec<u8>,
    cursor: u64,
    flags: OpenFlags,
    is_dir: bool,
    state: HandleState,
    span: Span,
}

impl SqlFile {
    pub(crate) fn file(
        tree: Tree,
        path: &str,
        content: Vec<u8>,
        flags: OpenFlags,
    ) -> Self {
        let cursor = if flags.append { content.len() as u64 } else { 0 };
        Self {
            tree,
            path: path.to_string(),
            buf: content,
            cursor,
            flags,
            is_dir: false,
            state: HandleState::Open,
            span: tracing::debug_span!("handle", path = %path),
        }
    }

    pub(crate) fn directory(tree: Tree, path: &str) -> Self {
        Self {
            tree,
            path: path.to_string(),
            buf: Vec::new(),
            cursor: 0,
            flags: OpenFlags::read_only(),
            is_dir: true,
            state: HandleState::Open,
            span: tracing::debug_span!("handle", path = %path),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base name of the node.
    pub fn name(&self) -> &str {
        path::base_name(&self.path)
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    fn ensure_open(&self, op: &'static str) -> VfsResult<()> {
        match self.state {
            HandleState::Open => Ok(()),
            HandleState::Closed => Err(VfsError::invalid(op, &self.path, "handle is closed")),
            HandleState::Discarded => Err(VfsError::not_found(&self.path)),
        }
    }

    fn ensure_readable(&self, op: &'static str) -> VfsResult<()> {
        self.ensure_open(op)?;
        if self.is_dir {
            return Err(VfsError::invalid(op, &self.path, "is a directory"));
        }
        Ok(())
    }

    fn ensure_writable(&self, op: &'static str) -> VfsResult<()> {
        self.ensure_readable(op)?;
        if !self.flags.persists_on_close() {
            return Err(VfsError::invalid(op, &self.path, "handle not opened for writing"));
        }
        Ok(())
    }

    fn copy_out(&self, buf: &mut [u8], offset: u64) -> usize {
        let len = self.buf.len() as u64;
        if offset >= len {
            return 0;
        }
        let start = offset as usize;
        let n = buf.len().min(self.buf.len() - start);
        buf[..n].copy_from_slice(&self.buf[start..start + n]);
        n
    }
}

impl VfsFile for SqlFile {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.ensure_readable("read")?;
        let n = self.copy_out(buf, self.cursor);
        self.cursor += n as u64;
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        self.ensure_readable("read_at")?;
        Ok(self.copy_out(buf, offset))
    }

    fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.ensure_writable("write")?;
        let _enter = self.span.enter();

        // Nothing to store, so nothing can exceed the limit.
        if data.is_empty() {
            return Ok(0);
        }

        let limit = self.tree.max_file_size();
        let incoming = data.len() as u64;
        let grown = (self.buf.len() as u64).saturating_add(incoming);
        let end = match self.cursor.checked_add(incoming) {
            Some(end) if end <= limit && grown <= limit => end,
            _ => {
                self.tree.discard(&self.path)?;
                self.state = HandleState::Discarded;
                self.buf = Vec::new();
                return Err(VfsError::StorageExceeded {
                    path: self.path.clone(),
                    limit,
                });
            }
        };

        let start = usize::try_from(self.cursor)
            .map_err(|_| VfsError::invalid("write", &self.path, "position out of range"))?;
        let end = usize::try_from(end)
            .map_err(|_| VfsError::invalid("write", &self.path, "position out of range"))?;
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(data);
        self.cursor = end as u64;
        Ok(data.len())
    }

    fn write_at(&mut self, _data: &[u8], _offset: u64) -> VfsResult<usize> {
        Err(VfsError::invalid("write_at", &self.path, "not supported"))
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.ensure_readable("seek")?;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.cursor) + i128::from(delta),
            SeekFrom::End(delta) => self.buf.len() as i128 + i128::from(delta),
        };
        if target < 0 {
            return Err(VfsError::invalid("seek", &self.path, "negative position"));
        }
        self.cursor = u64::try_from(target)
            .map_err(|_| VfsError::invalid("seek", &self.path, "position out of range"))?;
        Ok(self.cursor)
    }

    fn close(&mut self) -> VfsResult<()> {
        if self.state != HandleState::Open {
            return Ok(());
        }
        let _enter = self.span.enter();
        if !self.is_dir && self.flags.persists_on_close() {
            self.tree.persist(&self.path, &self.buf)?;
        }
        self.state = HandleState::Closed;
        debug!(size = self.buf.len(), "closed handle");
        Ok(())
    }

    fn readdir(&mut self, limit: usize) -> VfsResult<Vec<NodeInfo>> {
        self.ensure_open("readdir")?;
        if !self.is_dir {
            return Err(VfsError::invalid("readdir", &self.path, "not a directory"));
        }
        let _enter = self.span.enter();
        self.tree.list(&self.path, (limit > 0).then_some(limit))
    }

    /// Metadata of the stored node, not of this handle's unsaved buffer.
    fn stat(&self) -> VfsResult<NodeInfo> {
        if self.state == HandleState::Discarded {
            return Err(VfsError::not_found(&self.path));
        }
        self.tree.stat(&self.path)
    }

    fn sync(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn truncate(&mut self, size: i64) -> VfsResult<()> {
        self.ensure_writable("truncate")?;
        let size = u64::try_from(size)
            .map_err(|_| VfsError::invalid("truncate", &self.path, "negative size"))?;
        let limit = self.tree.max_file_size();
        if size > limit {
            return Err(VfsError::StorageExceeded {
                path: self.path.clone(),
                limit,
            });
        }
        self.buf.resize(size as usize, 0);
        Ok(())
    }
}

impl io::Read for SqlFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        VfsFile::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for SqlFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        VfsFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        VfsFile::sync(self).map_err(io::Error::from)
    }
}

impl io::Seek for SqlFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        VfsFile::seek(self, pos).map_err(io::Error::from)
    }
}

impl Drop for SqlFile {
    fn drop(&mut self) {
        if self.state == HandleState::Open && !self.is_dir && self.flags.persists_on_close() {
            let _enter = self.span.enter();
            warn!(
                size = self.buf.len(),
                "write handle dropped without close, buffer discarded"
            );
        }
    }
}
