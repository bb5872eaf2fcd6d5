use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageError;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Public URL of an object: `https://<host>/<bucket>/<key>`.
pub fn public_url(host: &str, bucket: &str, key: &str) -> String {
    format!("https://{}/{}/{}", host.trim_end_matches('/'), bucket, key)
}

/// A bucket of write-once objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Create the object `key`.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the key was written before.
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Attach key/value metadata to an existing object.
    async fn set_metadata(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Where the object can be fetched publicly.
    fn public_url(&self, key: &str) -> String;

    /// Whether [`ObjectStore::set_metadata`] is meaningful for this store.
    fn supports_metadata(&self) -> bool;
}
