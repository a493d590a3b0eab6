// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the SQL-backed filesystem engine

use std::io;

/// Fieldless classification of [`VfsError`], for callers that map failures to
/// protocol status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidOperation,
    DirectoryNotEmpty,
    StorageExceeded,
    BackendFailure,
}

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum VfsError {
    #[error("{path}: not found")]
    NotFound { path: String },

    #[error("{path}: already exists")]
    AlreadyExists { path: String },

    #[error("{op} {path}: {reason}")]
    InvalidOperation {
        op: &'static str,
        path: String,
        reason: &'static str,
    },

    #[error("{path}: directory not empty")]
    DirectoryNotEmpty { path: String },

    /// Raised by a write that would grow a file past the size ceiling. The
    /// write path deletes the file's node before returning this error.
    #[error("{path}: exceeds the maximum file size of {limit} bytes")]
    StorageExceeded { path: String, limit: u64 },

    #[error("{op} {path}: backing store failure: {source}")]
    Backend {
        op: &'static str,
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}

pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn invalid(op: &'static str, path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidOperation {
            op,
            path: path.into(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::NotFound { .. } => ErrorKind::NotFound,
            VfsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            VfsError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            VfsError::DirectoryNotEmpty { .. } => ErrorKind::DirectoryNotEmpty,
            VfsError::StorageExceeded { .. } => ErrorKind::StorageExceeded,
            VfsError::Backend { .. } => ErrorKind::BackendFailure,
        }
    }

    /// Path the failed operation was addressing.
    pub fn path(&self) -> &str {
        match self {
            VfsError::NotFound { path }
            | VfsError::AlreadyExists { path }
            | VfsError::InvalidOperation { path, .. }
            | VfsError::DirectoryNotEmpty { path }
            | VfsError::StorageExceeded { path, .. }
            | VfsError::Backend { path, .. } => path,
        }
    }
}

/// Attaches the operation and path to raw SQLite failures.
pub(crate) trait BackendContext<T> {
    fn backend(self, op: &'static str, path: &str) -> VfsResult<T>;
}

impl<T> BackendContext<T> for Result<T, rusqlite::Error> {
    fn backend(self, op: &'static str, path: &str) -> VfsResult<T> {
        self.map_err(|source| VfsError::Backend {
            op,
            path: path.to_string(),
            source,
        })
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::InvalidOperation => io::ErrorKind::InvalidInput,
            ErrorKind::DirectoryNotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorKind::StorageExceeded => io::ErrorKind::StorageFull,
            ErrorKind::BackendFailure => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
