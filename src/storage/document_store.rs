// src/storage/document_store.rs
//! Versioned document store contract.
//!
//! The registry only needs whole-object reads and compare-and-swap writes:
//! every read returns an opaque version token (`sha`) that must be echoed on
//! the next write of the same path. Document structure is not interpreted at
//! this layer; content is opaque bytes.

use async_trait::async_trait;
use thiserror::Error;

/// A stored object together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub content: Vec<u8>,
    pub sha: String,
}

/// Failures reported by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since `sha` was read, or already exists when an
    /// unconditional create was requested.
    #[error("version conflict writing {path}")]
    Conflict { path: String },

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status} for {path}: {body}")]
    Status { path: String, status: u16, body: String },

    #[error("store returned undecodable content for {path}")]
    Encoding { path: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Remote object store with optimistic concurrency.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the object at `path`.
    ///
    /// # Returns
    /// - `Ok(Some(doc))` with content and current version token
    /// - `Ok(None)` if nothing is stored at `path`
    /// - `Err` for any other failure
    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Writes `content` to `path`.
    ///
    /// # Arguments
    /// * `message` - Audit note recorded in the store's own history
    /// * `sha` - Version the caller read. `None` means "create": the write
    ///   fails with `StoreError::Conflict` if the object already exists.
    ///
    /// # Returns
    /// The new version token.
    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<String, StoreError>;
}
