//! Remote object storage client.
//!
//! Uploads go to a Supabase Storage bucket over its REST API with upsert
//! semantics, so re-uploading the same key overwrites instead of failing.
//! The public retrieval URL is deterministic from base URL + bucket + key.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage credentials are not configured")]
    MissingCredentials,
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage rejected upload with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object upload seam used by the ingestion pipeline.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `bytes` under `key` and return the public URL. Idempotent
    /// under the same key.
    async fn upload(
        &self,
        key: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> StorageResult<String>;

    /// Whether uploads can be attempted at all. Readiness reporting uses
    /// this; it must not perform I/O.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Supabase Storage client.
///
/// Credentials are optional at construction: the original deployment only
/// failed when an upload actually happened, and readiness reporting wants
/// to inspect the configuration without erroring.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(base_url: Option<String>, api_key: Option<String>, bucket: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_key,
            bucket,
        }
    }

    fn credentials(&self) -> StorageResult<(&str, &str)> {
        match (self.base_url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(StorageError::MissingCredentials),
        }
    }

    fn object_url(base_url: &str, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", base_url, bucket, key)
    }

    /// Public URL for a stored object: `{base}/storage/v1/object/public/{bucket}/{key}`.
    fn public_url(base_url: &str, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", base_url, bucket, key)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        key: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> StorageResult<String> {
        let (base_url, api_key) = self.credentials()?;

        let response = self
            .client
            .post(Self::object_url(base_url, &self.bucket, key))
            .bearer_auth(api_key)
            .header("x-upsert", "true")
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        tracing::debug!("uploaded object {} to bucket {}", key, self.bucket);
        Ok(Self::public_url(base_url, &self.bucket, key))
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_is_derived_from_base_bucket_and_key() {
        assert_eq!(
            SupabaseStorage::public_url("https://proj.supabase.co", "file-mapping-bucket", "a.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/file-mapping-bucket/a.jpg"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_normalized() {
        let storage = SupabaseStorage::new(
            Some("https://proj.supabase.co/".into()),
            Some("service-role-key".into()),
            "file-mapping-bucket".into(),
        );
        assert!(storage.is_configured());
        assert_eq!(storage.base_url.as_deref(), Some("https://proj.supabase.co"));
    }

    #[tokio::test]
    async fn upload_without_credentials_fails_before_any_request() {
        let storage = SupabaseStorage::new(None, None, "file-mapping-bucket".into());
        assert!(!storage.is_configured());
        let err = storage
            .upload("a.jpg", Some("image/jpeg"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingCredentials));
    }
}
