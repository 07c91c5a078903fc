// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key/Value Storage
//!
//! Persistence seam for data that must outlive the process, currently the
//! signing credential set of each identity.
//!
//! ## Backends
//!
//! - [`MemoryStorage`]: process-local map, used by tests and short-lived tools
//! - [`DirectoryStorage`]: one file per key under a data directory, written
//!   atomically (temp file + rename)
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   kv/
//!     {sanitized key}.bin
//! ```

pub mod directory;
pub mod memory;
pub mod paths;

pub use directory::DirectoryStorage;
pub use memory::MemoryStorage;
pub use paths::StoragePaths;

use std::fmt;
use std::io;

/// Error type for storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Key cannot be mapped onto the backend
    InvalidKey(String),
    /// A lock guarding the backend was poisoned by a panicking writer
    Poisoned,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Json(e) => write!(f, "JSON error: {e}"),
            StorageError::InvalidKey(key) => write!(f, "Invalid storage key: {key}"),
            StorageError::Poisoned => write!(f, "Storage lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte-oriented key/value store.
///
/// `set(key, None)` removes the entry. Removing a missing key is not an error.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: Option<&[u8]>) -> StorageResult<()>;
}
