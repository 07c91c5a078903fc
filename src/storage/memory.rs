// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory key/value storage.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{KeyValueStorage, StorageError, StorageResult};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<&[u8]>) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        match value {
            Some(data) => {
                entries.insert(key.to_string(), data.to_vec());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}
