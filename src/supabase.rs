//! Supabase-backed record and blob stores.
//!
//! Records are read and patched through the PostgREST endpoint
//! (`/rest/v1/<table>`); artifacts are uploaded through the Storage API
//! (`/storage/v1/object/<bucket>/<path>`) with `x-upsert: true`, so a second
//! upload to the same path replaces the first. Public URLs follow the
//! `/storage/v1/object/public/<bucket>/<path>` scheme and need no signing.

use crate::error::{OrderFormError, StoreError};
use crate::record::SourceRecord;
use crate::store::{Backend, BlobStore, RecordStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connection settings for a Supabase project.
#[derive(Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    /// Service-role key; sent as both `apikey` and bearer token.
    pub service_key: String,
    /// Table holding the enquiry records. Default: `enquiries`.
    pub table: String,
    /// Storage bucket for generated artifacts. Default: `enquiry-pdfs`.
    pub bucket: String,
    /// Request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("table", &self.table)
            .field("bucket", &self.bucket)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            table: "enquiries".to_string(),
            bucket: "enquiry-pdfs".to_string(),
            timeout_secs: 30,
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`.
    pub fn from_env() -> Result<Self, OrderFormError> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| OrderFormError::InvalidConfig("SUPABASE_URL is not set".into()))?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").map_err(|_| {
            OrderFormError::InvalidConfig("SUPABASE_SERVICE_ROLE_KEY is not set".into())
        })?;
        Ok(Self::new(url, key))
    }

    /// Build both stores over one shared HTTP client.
    pub fn backend(&self) -> Result<Backend, OrderFormError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| OrderFormError::Internal(format!("HTTP client: {e}")))?;
        Ok(Backend::new(
            Arc::new(SupabaseRecordStore {
                client: client.clone(),
                config: self.clone(),
            }),
            Arc::new(SupabaseBlobStore {
                client,
                config: self.clone(),
            }),
        ))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Turn a non-2xx response into [`StoreError::Http`] with its body.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Http {
        status: status.as_u16(),
        body,
    })
}

/// PostgREST access to the enquiries table.
pub struct SupabaseRecordStore {
    client: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseRecordStore {
    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, self.config.table)
    }
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    async fn get(&self, id: &str) -> Result<Option<SourceRecord>, StoreError> {
        let request = self
            .client
            .get(self.table_url())
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
        let response = check(self.config.authed(request).send().await?).await?;
        let mut rows: Vec<SourceRecord> = response.json().await?;
        debug!("Record lookup '{}' returned {} row(s)", id, rows.len());
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn set_artifact_url(&self, id: &str, url: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "pdf_url": url }));
        check(self.config.authed(request).send().await?).await?;
        Ok(())
    }
}

/// Storage API access to the artifact bucket.
pub struct SupabaseBlobStore {
    client: reqwest::Client,
    config: SupabaseConfig,
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, path
        );
        let size = bytes.len();
        let request = self
            .client
            .post(url)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        check(self.config.authed(request).send().await?).await?;
        debug!("Uploaded {} bytes to {}/{}", size, self.config.bucket, path);
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, path
        )
    }
}
