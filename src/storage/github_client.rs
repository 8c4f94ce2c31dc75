// src/storage/github_client.rs
//! GitHub contents API client used as the registry's document store.
//!
//! Provides:
//! - Whole-file reads returning the blob `sha` as version token
//! - Conditional writes that GitHub rejects when the supplied `sha` is stale
//! - Base64 transfer encoding handled transparently
//! - Files above the inline size limit fetched as raw blobs at the same `sha`
//!
//! # Wire Contract
//! - `GET  {api}/repos/{owner}/{repo}/contents/{path}?ref={branch}` returns `{content, encoding, sha}` or 404
//! - `GET  {api}/repos/{owner}/{repo}/git/blobs/{sha}` (raw media type) when `encoding` is not `base64`
//! - `PUT  {api}/repos/{owner}/{repo}/contents/{path}` with `{message, branch, content, sha?}`
//!
//! # Security Considerations
//! - The token needs write access to the repository contents only
//! - Every request carries a client-level timeout; a stuck call fails instead of blocking forever

use crate::settings::Settings;
use crate::storage::document_store::{DocumentStore, StoreError, StoredDocument};
use crate::utils::serialization::{decode_content, encode_content};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const AGENT: &str = "bugbox-badge";
const JSON_MEDIA: &str = "application/vnd.github+json";
const RAW_MEDIA: &str = "application/vnd.github.raw+json";

/// Body returned by `GET .../contents/{path}`.
#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    /// `base64` for inline content, `none` when the file is too large to inline
    #[serde(default)]
    encoding: Option<String>,
    sha: String,
}

impl ContentResponse {
    fn is_inline(&self) -> bool {
        self.encoding.as_deref().map_or(self.content.is_some(), |e| e == "base64")
    }
}

/// Body sent to `PUT .../contents/{path}`.
#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    branch: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Body returned by a successful `PUT`.
#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

/// Document store backed by one branch of a GitHub repository.
#[derive(Clone)]
pub struct GitHubStore {
    /// Shared HTTP client (connection pooling, timeout)
    client: Client,
    /// `{api}/repos/{owner}/{repo}`
    repo_url: String,
    branch: String,
    token: String,
}

impl GitHubStore {
    /// Creates a store for the repository named in `settings`.
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(settings: &Settings, token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.store_timeout())
            .build()?;
        Ok(GitHubStore {
            client,
            repo_url: format!(
                "{}/repos/{}/{}",
                settings.github_api_base.trim_end_matches('/'),
                settings.github_owner,
                settings.github_repo
            ),
            branch: settings.github_branch.clone(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url, path.trim_start_matches('/'))
    }

    fn request(&self, builder: reqwest::RequestBuilder, accept: &str) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, accept)
    }

    /// Downloads the blob `sha` of `path` as raw bytes.
    ///
    /// Used when the contents API does not inline the file. Fetching by blob
    /// `sha` keeps the bytes consistent with the version token returned to
    /// the caller.
    async fn fetch_blob(&self, path: &str, sha: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .request(
                self.client.get(format!("{}/git/blobs/{}", self.repo_url, sha)),
                RAW_MEDIA,
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DocumentStore for GitHubStore {
    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        let response = self
            .request(self.client.get(self.url(path)), JSON_MEDIA)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: ContentResponse = response.json().await?;
        let content = match &body.content {
            Some(encoded) if body.is_inline() => {
                decode_content(encoded).map_err(|_| StoreError::Encoding {
                    path: path.to_string(),
                })?
            }
            // above the inline size limit: content is empty or absent
            _ => {
                log::debug!("{} not inlined (encoding {:?}); fetching blob", path, body.encoding);
                self.fetch_blob(path, &body.sha).await?
            }
        };
        Ok(Some(StoredDocument {
            content,
            sha: body.sha,
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<String, StoreError> {
        let body = PutRequest {
            message,
            branch: &self.branch,
            content: encode_content(content),
            sha,
        };
        let response = self
            .request(self.client.put(self.url(path)), JSON_MEDIA)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let created: PutResponse = response.json().await?;
            return Ok(created.content.sha);
        }
        if is_conflict(status, sha.is_some()) {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        Err(StoreError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

/// GitHub answers a stale `sha` with 409 and a create over an existing file
/// ("sha wasn't supplied") with 422.
fn is_conflict(status: StatusCode, conditional: bool) -> bool {
    status == StatusCode::CONFLICT || (!conditional && status == StatusCode::UNPROCESSABLE_ENTITY)
}
