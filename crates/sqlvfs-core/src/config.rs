// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the store, the engine limits, and the settings handed to
//! the protocol engine.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling for a single file's content: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VfsConfig {
    pub store: StoreConfig,
    pub limits: LimitsConfig,
    pub server: ServerSettings,
}

/// Backing store location and SQLite tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./sqlvfs.db"),
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LimitsConfig {
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Settings surfaced to the protocol engine. The filesystem engine itself does
/// not interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerSettings {
    pub listen_addr: String,
    pub passive_port_start: u16,
    pub passive_port_end: u16,
    pub connection_timeout_secs: u64,
    pub welcome_message: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:2121".to_string(),
            passive_port_start: 20000,
            passive_port_end: 20009,
            connection_timeout_secs: 300,
            welcome_message: "Welcome to SQLite FTP Mimic".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn passive_ports(&self) -> RangeInclusive<u16> {
        self.passive_port_start..=self.passive_port_end
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

impl VfsConfig {
    /// Load a TOML configuration file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: VfsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "limits.max-file-size must be greater than zero".to_string(),
            ));
        }
        if self.server.passive_port_start > self.server.passive_port_end {
            return Err(ConfigError::Invalid(format!(
                "passive port range {}-{} is inverted",
                self.server.passive_port_start, self.server.passive_port_end
            )));
        }
        if self.server.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.listen-addr must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = VfsConfig::from_toml_str("").unwrap();
        assert_eq!(config, VfsConfig::default());
        assert_eq!(config.limits.max_file_size, 10_485_760);
        assert_eq!(config.server.passive_ports(), 20000..=20009);
        assert_eq!(config.server.connection_timeout(), Duration::from_secs(300));
        assert_eq!(config.store.journal_mode, JournalMode::Wal);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = VfsConfig::from_toml_str(
            r#"
            [store]
            db-path = "/var/lib/sqlvfs/files.db"
            journal-mode = "delete"

            [limits]
            max-file-size = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/var/lib/sqlvfs/files.db"));
        assert_eq!(config.store.journal_mode, JournalMode::Delete);
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert_eq!(config.limits.max_file_size, 4096);
        assert_eq!(config.server.listen_addr, "127.0.0.1:2121");
    }

    #[test]
    fn rejects_inverted_passive_range() {
        let err = VfsConfig::from_toml_str(
            r#"
            [server]
            passive-port-start = 30010
            passive-port-end = 30000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_file_size() {
        let err = VfsConfig::from_toml_str("[limits]\nmax-file-size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_journal_mode() {
        let err = VfsConfig::from_toml_str("[store]\njournal-mode = \"truncate\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
