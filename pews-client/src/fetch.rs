//! The fetch collaborator: raw bytes for a resource path.
//!
//! Decoding never starts on a failed fetch. Failures are reported as
//! `PewsError::FetchFailure` and are not retried here; the poll loop simply
//! tries again on its next tick.

use std::time::Duration;

use async_trait::async_trait;
use pews_core::Result;
use tracing::debug;

use crate::error::ClientError;
use crate::paths::join_url;

/// Retrieves raw feed resources.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Bytes of the resource at `path` (relative to the feed base).
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for std::sync::Arc<T> {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        (**self).fetch(path).await
    }
}

/// Fetches resources over HTTP(S) from the provider.
#[derive(Clone)]
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpFetcher {
            base_url: base_url.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, ClientError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = join_url(&self.base_url, path);
        let bytes = self
            .get(&url)
            .await
            .map_err(|e| e.into_fetch_failure(path))?;
        debug!(%url, bytes = bytes.len(), "fetched resource");
        Ok(bytes)
    }
}

/// In-memory fetcher keyed by exact path; records every request.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryFetcher {
    resources: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    requests: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryFetcher {
    pub(crate) fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes);
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Fetch for MemoryFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(path.to_string());
        self.resources
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| pews_core::PewsError::FetchFailure {
                path: path.to_string(),
                reason: "HTTP 404".into(),
            })
    }
}
