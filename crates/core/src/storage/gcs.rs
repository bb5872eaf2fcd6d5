//! Google Cloud Storage over the JSON API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::debug;

use super::error::StorageError;
use super::traits::{public_url, ObjectStore};
use crate::config::StorageConfig;

pub struct GcsObjectStore {
    client: Client,
    api_url: String,
    bucket: String,
    public_host: String,
    access_token: Option<String>,
}

impl GcsObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        // Uploads are not bounded by a client timeout.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            public_host: config.public_host.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Build the client and check that the bucket exists.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let store = Self::new(config)?;
        let url = format!("{}/storage/v1/b/{}", store.api_url, store.bucket);
        let response = store.authorize(store.client.get(&url)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::BucketNotFound(store.bucket.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(bucket = %store.bucket, "GCS bucket found");
        Ok(store)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.api_url, self.bucket)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        let request = self
            .client
            .post(self.upload_url())
            // ifGenerationMatch=0 only succeeds if no live object exists.
            .query(&[("uploadType", "media"), ("name", key), ("ifGenerationMatch", "0")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if status == StatusCode::PRECONDITION_FAILED {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(key, size_bytes = size, "Object uploaded");
        Ok(())
    }

    async fn set_metadata(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let request = self
            .client
            .patch(self.object_url(key))
            .json(&json!({ "metadata": metadata }));
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.public_host, &self.bucket, key)
    }

    fn supports_metadata(&self) -> bool {
        true
    }
}
