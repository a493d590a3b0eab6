// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server-level entry point for a protocol engine: settings, connection
//! notifications and per-session adapters.

use crate::adapter::SqlFs;
use crate::config::{ServerSettings, VfsConfig};
use crate::error::VfsResult;
use crate::store::NodeTable;
use crate::tree::Tree;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Hands out one [`SqlFs`] per authenticated session. All sessions share the
/// same node table.
pub struct SessionDriver {
    tree: Tree,
    settings: ServerSettings,
    next_session: AtomicU64,
}

impl SessionDriver {
    pub fn new(table: NodeTable, config: &VfsConfig) -> Self {
        Self {
            tree: Tree::new(table, config.limits.max_file_size),
            settings: config.server.clone(),
            next_session: AtomicU64::new(1),
        }
    }

    /// Open the configured store and build a driver over it.
    pub fn from_config(config: &VfsConfig) -> VfsResult<Self> {
        let table = NodeTable::open(&config.store)?;
        Ok(Self::new(table, config))
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn welcome_message(&self) -> &str {
        &self.settings.welcome_message
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn client_connected(&self, client: SocketAddr) {
        let _enter = self.tree.table().span().enter();
        info!(%client, "client connected");
    }

    pub fn client_disconnected(&self, client: SocketAddr) {
        let _enter = self.tree.table().span().enter();
        info!(%client, "client disconnected");
    }

    /// Build the adapter for a session the protocol engine has already
    /// authorized. Credentials are not checked here and never logged.
    pub fn authenticate(&self, user: &str, _password: &str) -> SqlFs {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!(parent: self.tree.table().span(), "session", id, user = %user);
        span.in_scope(|| info!("session started"));
        SqlFs::new(self.tree.clone(), span)
    }
}
