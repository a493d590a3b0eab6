// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use sqlvfs_core::{
    ErrorKind, Filesystem, NodeInfo, OpenFlags, SessionDriver, VfsFile, VfsResult,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Session identity used for operator commands.
const OPERATOR: &str = "operator";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store (if needed) and report its size
    Init,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show metadata for one node
    Stat {
        path: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a directory
    Mkdir {
        /// Create missing parents, accept existing directories
        #[arg(short, long)]
        parents: bool,
        path: String,
    },
    /// Upload a local file
    Put { local: PathBuf, remote: String },
    /// Download a file (to stdout when no local path is given)
    Get {
        remote: String,
        local: Option<PathBuf>,
    },
    /// Print a file
    Cat { remote: String },
    /// Remove a file or empty directory
    Rm {
        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,
        path: String,
    },
    /// Move or rename a node
    Mv { old: String, new: String },
    /// Create an empty file or update a modification time
    Touch {
        path: String,
        /// RFC 3339 timestamp (default: now)
        #[arg(long)]
        time: Option<DateTime<Utc>>,
    },
    /// Node and byte counts for the store
    Df,
    /// Print the server settings handed to the protocol engine
    Settings,
}

pub fn run(driver: &SessionDriver, command: Command, out: &mut dyn Write) -> Result<()> {
    let fs = driver.authenticate(OPERATOR, "");
    debug!(?command, "running command");

    match command {
        Command::Init => {
            let stats = driver.tree().table().stats()?;
            writeln!(
                out,
                "store ready: {} directories, {} files",
                stats.directories, stats.files
            )?;
        }
        Command::Ls { path } => list(&fs, &path, out)?,
        Command::Stat { path, json } => {
            let info = fs.stat(&path)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
            } else {
                writeln!(out, "path:     {}", info.path)?;
                writeln!(out, "type:     {}", if info.is_dir { "directory" } else { "file" })?;
                writeln!(out, "size:     {}", info.size)?;
                writeln!(out, "mode:     {:06o}", info.mode())?;
                writeln!(out, "modified: {}", info.mod_time.to_rfc3339())?;
            }
        }
        Command::Mkdir { parents, path } => {
            if parents {
                fs.mkdir_all(&path)?;
            } else {
                fs.mkdir(&path)?;
            }
        }
        Command::Put { local, remote } => {
            let data = std::fs::read(&local)
                .with_context(|| format!("failed to read {}", local.display()))?;
            upload(&fs, &remote, &data)?;
            writeln!(out, "{} bytes written to {}", data.len(), remote)?;
        }
        Command::Get { remote, local } => {
            let data = download(&fs, &remote)?;
            match local {
                Some(local) => std::fs::write(&local, &data)
                    .with_context(|| format!("failed to write {}", local.display()))?,
                None => out.write_all(&data)?,
            }
        }
        Command::Cat { remote } => {
            out.write_all(&download(&fs, &remote)?)?;
        }
        Command::Rm { recursive, path } => {
            if recursive {
                fs.remove_all(&path)?;
            } else {
                fs.remove(&path)?;
            }
        }
        Command::Mv { old, new } => fs.rename(&old, &new)?,
        Command::Touch { path, time } => touch(&fs, &path, time.unwrap_or_else(Utc::now))?,
        Command::Df => {
            let stats = driver.tree().table().stats()?;
            writeln!(out, "nodes:         {}", stats.nodes)?;
            writeln!(out, "directories:   {}", stats.directories)?;
            writeln!(out, "files:         {}", stats.files)?;
            writeln!(out, "content bytes: {}", stats.content_bytes)?;
            writeln!(out, "max file size: {}", driver.tree().max_file_size())?;
        }
        Command::Settings => {
            write!(out, "{}", toml::to_string(driver.settings())?)?;
        }
    }
    Ok(())
}

fn format_entry(info: &NodeInfo) -> String {
    format!(
        "{}{:04o} {:>10} {} {}{}",
        if info.is_dir { 'd' } else { '-' },
        info.mode() & 0o7777,
        info.size,
        info.mod_time.format("%Y-%m-%d %H:%M"),
        info.name,
        if info.is_dir { "/" } else { "" }
    )
}

fn list<F: Filesystem>(fs: &F, path: &str, out: &mut dyn Write) -> Result<()> {
    let mut handle = fs.open(path)?;
    let info = handle.stat()?;
    if info.is_dir {
        for entry in handle.readdir(0)? {
            writeln!(out, "{}", format_entry(&entry))?;
        }
    } else {
        writeln!(out, "{}", format_entry(&info))?;
    }
    handle.close()?;
    Ok(())
}

fn upload<F: Filesystem>(fs: &F, remote: &str, data: &[u8]) -> VfsResult<()> {
    let mut file = fs.create(remote)?;
    file.write(data)?;
    file.close()
}

fn download<F: Filesystem>(fs: &F, remote: &str) -> VfsResult<Vec<u8>> {
    let mut file = fs.open(remote)?;
    let mut data = Vec::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
    }
    file.close()?;
    Ok(data)
}

fn touch<F: Filesystem>(fs: &F, path: &str, when: DateTime<Utc>) -> VfsResult<()> {
    match fs.stat(path) {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let flags = OpenFlags {
                write: true,
                create: true,
                ..OpenFlags::default()
            };
            fs.open_file(path, flags)?.close()?;
        }
        Err(err) => return Err(err),
    }
    fs.chtimes(path, when)
}
