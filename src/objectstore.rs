//! Object store collaborator (spec §6): holds generated PDFs and uploaded
//! attachments.

use crate::error::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String>;
    async fn signed_url(&self, path: &str, ttl_seconds: u64) -> Result<String>;
}

pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::internal(format!("building object store http client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let resp = self
            .http
            .put(format!("{}/objects/{}", self.base_url, path))
            .header("content-type", content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Error::transient_backend("object_store", e.to_string()))?;

        if !resp.status().is_success() {
            return if resp.status().is_server_error() {
                Err(Error::transient_backend("object_store", resp.status().to_string()))
            } else {
                Err(Error::permanent_backend("object_store", resp.status().to_string()))
            };
        }
        Ok(format!("{}/objects/{}", self.base_url, path))
    }

    async fn signed_url(&self, path: &str, ttl_seconds: u64) -> Result<String> {
        Ok(format!("{}/objects/{}?ttl={}", self.base_url, path, ttl_seconds))
    }
}

/// In-memory stand-in used by tests: tracks written paths without hitting
/// the network.
pub struct FakeObjectStore {
    pub written: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self { written: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }
}

impl Default for FakeObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        self.written.lock().unwrap().insert(path.to_string(), bytes.to_vec());
        Ok(format!("objects/{path}"))
    }

    async fn signed_url(&self, path: &str, ttl_seconds: u64) -> Result<String> {
        if !self.written.lock().unwrap().contains_key(path) {
            return Err(Error::not_found("object", path));
        }
        Ok(format!("https://objects.local/{path}?ttl={ttl_seconds}"))
    }
}
