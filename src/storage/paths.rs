// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout for directory-backed storage.

use std::path::{Path, PathBuf};

use super::{StorageError, StorageResult};

/// Default data directory, relative to the working directory.
pub const DATA_ROOT: &str = "./data";

const ENTRY_EXTENSION: &str = "bin";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persisted data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding key/value entries.
    pub fn kv_dir(&self) -> PathBuf {
        self.root.join("kv")
    }

    /// File backing a single key.
    ///
    /// Keys may contain ASCII alphanumerics, `-`, `_` and `.`; anything else
    /// (path separators in particular) is rejected rather than escaped.
    pub fn entry_path(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.kv_dir().join(format!("{key}.{ENTRY_EXTENSION}")))
    }
}
