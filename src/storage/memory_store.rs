// src/storage/memory_store.rs
//! In-memory document store with the same compare-and-swap rules as the
//! remote store.
//!
//! Used for local runs without repository access and as the store behind the
//! registry and API tests. Versions are issued from a counter, so every write
//! produces a token never seen before.

use crate::storage::document_store::{DocumentStore, StoreError, StoredDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredDocument>,
    /// Commit messages of successful writes, oldest first
    history: Vec<(String, String)>,
    next_version: u64,
}

/// Thread-safe in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // every write is a single insert, so a poisoned map is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().history.len()
    }

    /// `(path, message)` of every successful write, oldest first.
    pub fn history(&self) -> Vec<(String, String)> {
        self.lock().history.clone()
    }

    /// Current content at `path`, if any.
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).map(|doc| doc.content.clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.lock().objects.get(path).cloned())
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut inner = self.lock();
        let current = inner.objects.get(path).map(|doc| doc.sha.as_str());
        if current != sha {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }

        inner.next_version += 1;
        let version = format!("v{}", inner.next_version);
        inner.objects.insert(
            path.to_string(),
            StoredDocument {
                content: content.to_vec(),
                sha: version.clone(),
            },
        );
        inner.history.push((path.to_string(), message.to_string()));
        Ok(version)
    }
}
