// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::Command;
use sqlvfs_core::{SessionDriver, VfsConfig};
use sqlvfs_logging::CliLoggingArgs;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sqlvfs",
    author,
    version,
    about = "Inspect and edit a SQLite-backed virtual filesystem"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides store.db-path)
    #[arg(long, global = true, env = "SQLVFS_DB")]
    db: Option<PathBuf>,

    /// Maximum size of a single file in bytes (overrides limits.max-file-size)
    #[arg(long, global = true, env = "SQLVFS_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    fn resolve_config(&self) -> Result<VfsConfig> {
        let mut config = match &self.config {
            Some(path) => VfsConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => VfsConfig::default(),
        };
        if let Some(db) = &self.db {
            config.store.db_path = db.clone();
        }
        if let Some(max_file_size) = self.max_file_size {
            config.limits.max_file_size = max_file_size;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.clone().init("sqlvfs")?;

    let config = cli.resolve_config()?;
    let driver = SessionDriver::from_config(&config).with_context(|| {
        format!("failed to open store {}", config.store.db_path.display())
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(&driver, cli.command, &mut out)
}
