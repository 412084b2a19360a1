//! Collaborator seams: record store, blob store and image fetcher.
//!
//! The pipeline only talks to the outside world through these three traits.
//! [`crate::supabase`] implements the stores over HTTP; the in-memory
//! versions here back the tests and any embedder that keeps state locally.

use crate::error::StoreError;
use crate::record::{FetchedBlob, SourceRecord};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Structured record storage, addressed by record id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read one record. `Ok(None)` means the id does not exist.
    async fn get(&self, id: &str) -> Result<Option<SourceRecord>, StoreError>;

    /// Overwrite the record's artifact URL field.
    async fn set_artifact_url(&self, id: &str, url: &str) -> Result<(), StoreError>;
}

/// Binary object storage with overwrite semantics.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing anything already there, and return
    /// the durable URL of the stored object.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StoreError>;

    /// Durable URL for `path`, without uploading anything.
    fn public_url(&self, path: &str) -> String;
}

/// Retrieves raw image bytes by URL.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob, StoreError>;
}

/// The two stores a full generation run needs.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }
}

// ── HTTP fetcher ─────────────────────────────────────────────────────────

/// Fetches `http(s)://` URLs with reqwest and decodes `data:` URIs in place.
///
/// Bodies are read incrementally and abandoned as soon as they pass
/// `max_bytes`, so an oversized image never sits in memory whole.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, max_bytes: usize) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
            max_bytes,
        })
    }

    fn classify(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob, StoreError> {
        if url.starts_with("data:") {
            let blob = decode_data_uri(url)?;
            if blob.bytes.len() > self.max_bytes {
                return Err(StoreError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            return Ok(blob);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                debug!("Refusing {} ({} bytes declared)", url, declared);
                return Err(StoreError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            if bytes.len() + chunk.len() > self.max_bytes {
                debug!("Abandoning {} after {} bytes", url, bytes.len());
                return Err(StoreError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(FetchedBlob {
            bytes,
            content_type,
        })
    }
}

/// Decode an RFC 2397 `data:` URI.
fn decode_data_uri(uri: &str) -> Result<FetchedBlob, StoreError> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| StoreError::Decode("malformed data URI".into()))?;

    let mime = header.split(';').next().filter(|m| !m.is_empty());
    let bytes = if header.ends_with(";base64") {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| StoreError::Decode(format!("data URI base64: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(FetchedBlob {
        bytes,
        content_type: mime.map(str::to_string),
    })
}

// ── In-memory stores ─────────────────────────────────────────────────────

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A record store held in process memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, SourceRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: SourceRecord) {
        lock(&self.records).insert(record.id.clone(), record);
    }

    /// Current state of a record.
    pub fn snapshot(&self, id: &str) -> Option<SourceRecord> {
        lock(&self.records).get(id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &str) -> Result<Option<SourceRecord>, StoreError> {
        Ok(self.snapshot(id))
    }

    async fn set_artifact_url(&self, id: &str, url: &str) -> Result<(), StoreError> {
        match lock(&self.records).get_mut(id) {
            Some(record) => {
                record.artifact_url = Some(url.to_string());
                Ok(())
            }
            None => Err(StoreError::Http {
                status: 404,
                body: format!("no record {id}"),
            }),
        }
    }
}

/// A blob store held in process memory. URLs are `<base_url>/<path>`.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.blobs).get(path).cloned()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = lock(&self.blobs).keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StoreError> {
        lock(&self.blobs).insert(path.to_string(), bytes);
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}
