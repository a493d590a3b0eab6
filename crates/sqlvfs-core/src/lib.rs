// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! SQLite-backed virtual filesystem for FTP-style servers.
//!
//! The whole namespace lives in one SQLite table keyed by canonical path.
//! A protocol engine obtains a [`SessionDriver`], authenticates each session
//! into a [`SqlFs`], and drives it through the [`Filesystem`] and [`VfsFile`]
//! traits.

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod handle;
pub mod path;
pub mod store;
pub mod tree;
pub mod types;

pub use adapter::{Filesystem, SqlFs, ADAPTER_NAME};
pub use config::{
    ConfigError, JournalMode, LimitsConfig, ServerSettings, StoreConfig, VfsConfig,
    DEFAULT_MAX_FILE_SIZE,
};
pub use driver::SessionDriver;
pub use error::{ErrorKind, VfsError, VfsResult};
pub use handle::{SqlFile, VfsFile};
pub use store::NodeTable;
pub use tree::Tree;
pub use types::{NodeInfo, OpenFlags, StoreStats};
