// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem-backed key/value storage.
//!
//! Each key maps to one file under `{root}/kv/`. Writes go to a sibling
//! temp file first and are renamed into place, so a reader never observes a
//! partially written credential set.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use tracing::debug;

use super::{KeyValueStorage, StoragePaths, StorageResult};

/// Directory-backed storage.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    paths: StoragePaths,
}

impl DirectoryStorage {
    /// Open storage rooted at `paths`, creating the directory layout.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.kv_dir())?;
        Ok(Self { paths })
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Write raw bytes to a file (atomic write via rename).
    fn write_raw(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.paths.entry_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(data)?;
            writer.flush()?;
        }

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!(key, bytes = data.len(), "storage entry written");
        Ok(())
    }

    fn read_raw(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.paths.entry_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.paths.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "storage entry removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStorage for DirectoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.read_raw(key)
    }

    fn set(&self, key: &str, value: Option<&[u8]>) -> StorageResult<()> {
        match value {
            Some(data) => self.write_raw(key, data),
            None => self.delete(key),
        }
    }
}
