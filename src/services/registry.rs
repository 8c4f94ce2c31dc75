// src/services/registry.rs
//! Registry update protocol.
//!
//! The registry is a single JSON document in the store, shared by every
//! issuing process and never locked. Updates are optimistic: read the
//! document and its version token, apply the change in memory, write back
//! with that token. A concurrent writer makes the write fail with a version
//! conflict, in which case the read-modify-write cycle is repeated a bounded
//! number of times.
//!
//! Layout in the store:
//! - `<dir>/<id>.json`: one file per badge
//! - `<dir>/registry.json`: the index of all badges, most recent first

use crate::models::badge::{BadgeRecord, IssuerInfo, RegistryDocument};
use crate::storage::document_store::{DocumentStore, StoreError};
use crate::utils::serialization::to_pretty_json;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

/// Failures of a registry update.
///
/// Any failure leaves the operation retry-safe: the per-badge file may
/// already exist, but a repeated upsert of the same badge converges.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry still conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode registry document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Applies badge upserts to the shared registry document.
#[derive(Clone)]
pub struct RegistryUpdater {
    store: Arc<dyn DocumentStore>,
    dir: String,
    default_issuer: IssuerInfo,
    max_attempts: u32,
}

impl RegistryUpdater {
    /// Creates an updater writing below `dir`.
    ///
    /// # Arguments
    /// * `default_issuer` - Issuer of a registry created from scratch
    /// * `max_attempts` - Total read-modify-write attempts; `1` disables retry
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dir: &str,
        default_issuer: IssuerInfo,
        max_attempts: u32,
    ) -> Self {
        RegistryUpdater {
            store,
            dir: dir.trim_end_matches('/').to_string(),
            default_issuer,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn badge_path(&self, id: &str) -> String {
        format!("{}/{}.json", self.dir, id)
    }

    pub fn registry_path(&self) -> String {
        format!("{}/registry.json", self.dir)
    }

    /// Stores `badge` and indexes it at the front of the registry.
    ///
    /// # Process Flow
    /// 1. Write the badge file (see `write_record`)
    /// 2. Read the registry, or start an empty one if absent
    /// 3. Drop any entry with the same id, prepend the badge
    /// 4. Write the registry back with the version token from step 2
    /// 5. On version conflict, repeat 2-4 up to `max_attempts` in total
    ///
    /// # Errors
    /// - `RegistryError::Conflict` when every attempt lost the race
    /// - `RegistryError::Store` on any transport failure (not retried)
    pub async fn upsert_badge(&self, badge: &BadgeRecord) -> Result<(), RegistryError> {
        self.write_record(badge).await?;

        for attempt in 1..=self.max_attempts {
            match self.try_update_registry(badge).await {
                Ok(()) => {
                    info!("Registry updated with badge {} (attempt {})", badge.id, attempt);
                    return Ok(());
                }
                Err(RegistryError::Store(e)) if e.is_conflict() => {
                    warn!(
                        "Registry version conflict for badge {} (attempt {}/{})",
                        badge.id, attempt, self.max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(RegistryError::Conflict {
            attempts: self.max_attempts,
        })
    }

    /// Writes the standalone badge file.
    ///
    /// Ids are fresh, so this is normally a plain create without a version
    /// token. Re-issuing an existing id replaces the file wholesale: the
    /// create is rejected, and the write is repeated once against the
    /// current version.
    async fn write_record(&self, badge: &BadgeRecord) -> Result<(), RegistryError> {
        let path = self.badge_path(&badge.id);
        let record = to_pretty_json(badge)?;
        let recipient = if badge.recipient.name.is_empty() {
            "Recipient"
        } else {
            badge.recipient.name.as_str()
        };
        let message = format!("Add badge {} for {}", badge.id, recipient);

        match self.store.put(&path, record.as_bytes(), &message, None).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                let current = self.store.get(&path).await?.map(|doc| doc.sha);
                self.store
                    .put(&path, record.as_bytes(), &message, current.as_deref())
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the registry, tolerating absent or malformed content.
    ///
    /// # Returns
    /// The decoded document and the version token to write back with
    /// (`None` when the registry does not exist yet).
    pub async fn load(&self) -> Result<(RegistryDocument, Option<String>), RegistryError> {
        let path = self.registry_path();
        match self.store.get(&path).await? {
            None => Ok((RegistryDocument::empty(self.default_issuer.clone()), None)),
            Some(stored) => {
                let (document, recovered) =
                    RegistryDocument::decode_lenient(&stored.content, &self.default_issuer);
                if recovered {
                    warn!("Registry at {} was malformed; badges reset to an empty list", path);
                }
                Ok((document, Some(stored.sha)))
            }
        }
    }

    async fn try_update_registry(&self, badge: &BadgeRecord) -> Result<(), RegistryError> {
        let (mut document, sha) = self.load().await?;
        document.upsert(badge)?;
        let content = to_pretty_json(&document.to_value()?)?;
        self.store
            .put(
                &self.registry_path(),
                content.as_bytes(),
                &format!("Update registry with {}", badge.id),
                sha.as_deref(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::badge::Recipient;
    use crate::storage::document_store::StoredDocument;
    use crate::storage::memory_store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    fn issuer() -> IssuerInfo {
        IssuerInfo {
            name: "BugBox".into(),
            website: String::new(),
        }
    }

    fn badge(id: &str, recipient: &str) -> BadgeRecord {
        BadgeRecord {
            id: id.into(),
            name: "Certified".into(),
            description: "d".into(),
            recipient: Recipient {
                name: recipient.into(),
                email: None,
            },
            issuer: issuer(),
            issued_on: "2025-01-01T00:00:00.000Z".into(),
            skills: vec!["testing".into()],
            image: "assets/badges/sample.png".into(),
            verify_url: format!("https://site/#id={}", id),
        }
    }

    fn updater(store: Arc<dyn DocumentStore>, attempts: u32) -> RegistryUpdater {
        RegistryUpdater::new(store, "registry", issuer(), attempts)
    }

    async fn registry_ids(updater: &RegistryUpdater) -> Vec<String> {
        let (doc, _) = updater.load().await.unwrap();
        doc.ids().into_iter().map(String::from).collect()
    }

    /// Store whose first two registry reads wait for each other, so two
    /// concurrent upserts are guaranteed to read the same version.
    struct LockstepStore {
        inner: MemoryStore,
        registry_path: String,
        reads: AtomicUsize,
        barrier: Barrier,
    }

    #[async_trait]
    impl DocumentStore for LockstepStore {
        async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
            let doc = self.inner.get(path).await?;
            if path == self.registry_path && self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            Ok(doc)
        }

        async fn put(
            &self,
            path: &str,
            content: &[u8],
            message: &str,
            sha: Option<&str>,
        ) -> Result<String, StoreError> {
            self.inner.put(path, content, message, sha).await
        }
    }

    /// Store that rejects every registry write as stale.
    struct AlwaysConflicting {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DocumentStore for AlwaysConflicting {
        async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
            self.inner.get(path).await
        }

        async fn put(
            &self,
            path: &str,
            content: &[u8],
            message: &str,
            sha: Option<&str>,
        ) -> Result<String, StoreError> {
            if path.ends_with("registry.json") {
                return Err(StoreError::Conflict { path: path.into() });
            }
            self.inner.put(path, content, message, sha).await
        }
    }

    #[tokio::test]
    async fn test_first_upsert_creates_registry_and_record() {
        let store = Arc::new(MemoryStore::new());
        let updater = updater(store.clone(), 3);
        let b = badge("id-1", "Alice");

        updater.upsert_badge(&b).await.unwrap();

        let record: BadgeRecord =
            serde_json::from_slice(&store.content("registry/id-1.json").unwrap()).unwrap();
        assert_eq!(record, b);
        assert_eq!(registry_ids(&updater).await, vec!["id-1"]);
        assert_eq!(
            store.history(),
            vec![
                ("registry/id-1.json".to_string(), "Add badge id-1 for Alice".to_string()),
                ("registry/registry.json".to_string(), "Update registry with id-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_is_indented_json() {
        let store = Arc::new(MemoryStore::new());
        updater(store.clone(), 1).upsert_badge(&badge("id-1", "")).await.unwrap();
        let text = String::from_utf8(store.content("registry/registry.json").unwrap()).unwrap();
        assert!(text.starts_with("{\n  \""));
        assert_eq!(store.history()[0].1, "Add badge id-1 for Recipient");
    }

    #[tokio::test]
    async fn test_upsert_same_id_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let updater = updater(store.clone(), 3);
        updater.upsert_badge(&badge("other", "Bob")).await.unwrap();
        updater.upsert_badge(&badge("dup", "First")).await.unwrap();
        let second = badge("dup", "Second");
        updater.upsert_badge(&second).await.unwrap();

        let (doc, _) = updater.load().await.unwrap();
        assert_eq!(doc.ids(), vec!["dup", "other"]);
        assert_eq!(doc.badges[0]["recipient"]["name"], "Second");

        let record: BadgeRecord =
            serde_json::from_slice(&store.content("registry/dup.json").unwrap()).unwrap();
        assert_eq!(record, second);
    }

    #[tokio::test]
    async fn test_newer_badges_come_first() {
        let store = Arc::new(MemoryStore::new());
        let updater = updater(store, 3);
        updater.upsert_badge(&badge("x", "X")).await.unwrap();
        updater.upsert_badge(&badge("y", "Y")).await.unwrap();
        assert_eq!(registry_ids(&updater).await, vec!["y", "x"]);
    }

    #[tokio::test]
    async fn test_malformed_registry_is_reset_and_overwritten() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("registry/registry.json", b"{ broken", "seed", None)
            .await
            .unwrap();
        let updater = updater(store.clone(), 3);

        updater.upsert_badge(&badge("fresh", "Alice")).await.unwrap();

        let (doc, _) = updater.load().await.unwrap();
        assert_eq!(doc.ids(), vec!["fresh"]);
        assert_eq!(doc.issuer, issuer());
    }

    #[tokio::test]
    async fn test_conflict_is_reported_after_bounded_attempts() {
        let store = Arc::new(AlwaysConflicting {
            inner: MemoryStore::new(),
        });
        let updater = updater(store.clone(), 3);

        let err = updater.upsert_badge(&badge("lost", "Alice")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { attempts: 3 }));
        // the standalone record was written; the index was not
        assert!(store.inner.content("registry/lost.json").is_some());
        assert!(store.inner.content("registry/registry.json").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_without_retry_lose_one_write() {
        let store = Arc::new(LockstepStore {
            inner: MemoryStore::new(),
            registry_path: "registry/registry.json".into(),
            reads: AtomicUsize::new(0),
            barrier: Barrier::new(2),
        });
        let updater = updater(store.clone(), 1);
        let a = badge("a", "A");
        let b = badge("b", "B");

        let (ra, rb) = tokio::join!(updater.upsert_badge(&a), updater.upsert_badge(&b));

        let failures: Vec<_> = [ra, rb].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], RegistryError::Conflict { attempts: 1 }));
        assert_eq!(registry_ids(&updater).await.len(), 1);
        // both standalone records exist regardless
        assert!(store.inner.content("registry/a.json").is_some());
        assert!(store.inner.content("registry/b.json").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_with_retry_both_land() {
        let store = Arc::new(LockstepStore {
            inner: MemoryStore::new(),
            registry_path: "registry/registry.json".into(),
            reads: AtomicUsize::new(0),
            barrier: Barrier::new(2),
        });
        let updater = updater(store.clone(), 3);
        let a = badge("a", "A");
        let b = badge("b", "B");

        let (ra, rb) = tokio::join!(updater.upsert_badge(&a), updater.upsert_badge(&b));
        ra.unwrap();
        rb.unwrap();

        let mut ids = registry_ids(&updater).await;
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        struct Broken;

        #[async_trait]
        impl DocumentStore for Broken {
            async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
                Err(StoreError::Status {
                    path: path.into(),
                    status: 500,
                    body: String::new(),
                })
            }

            async fn put(
                &self,
                _path: &str,
                _content: &[u8],
                _message: &str,
                _sha: Option<&str>,
            ) -> Result<String, StoreError> {
                Ok("v1".into())
            }
        }

        let updater = updater(Arc::new(Broken), 3);
        let err = updater.upsert_badge(&badge("id", "A")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Store(StoreError::Status { status: 500, .. })));
    }
}
