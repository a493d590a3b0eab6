// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions shared by the engine, handles and adapters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MODE_DIR: u32 = 0o040000;

/// Metadata of one node, as reported by stat and directory listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
}

impl NodeInfo {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Synthetic permission bits. Nothing is enforced; clients that render
    /// listings still expect a mode.
    pub fn mode(&self) -> u32 {
        if self.is_dir {
            MODE_DIR | 0o755
        } else {
            0o644
        }
    }
}

/// File open options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Read/write, create if missing, start empty.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            append: false,
        }
    }

    pub fn append() -> Self {
        Self {
            write: true,
            append: true,
            create: true,
            ..Self::default()
        }
    }

    /// Translate `open(2)` style flag bits.
    pub fn from_posix(flags: i32) -> Self {
        use libc::{O_APPEND, O_CREAT, O_RDWR, O_TRUNC, O_WRONLY};

        let mut options = Self::default();
        if flags & O_RDWR != 0 {
            options.read = true;
            options.write = true;
        } else if flags & O_WRONLY != 0 {
            options.write = true;
        } else {
            options.read = true;
        }
        options.create = flags & O_CREAT != 0;
        options.truncate = flags & O_TRUNC != 0;
        options.append = flags & O_APPEND != 0;
        options
    }

    /// Whether closing a handle opened with these flags writes its buffer back.
    pub fn persists_on_close(&self) -> bool {
        self.write || self.append || self.create
    }
}

/// Aggregate counters over the node table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub nodes: u64,
    pub directories: u64,
    pub files: u64,
    pub content_bytes: u64,
}
