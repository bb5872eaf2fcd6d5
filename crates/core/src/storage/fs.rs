//! Local filesystem object store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::error::StorageError;
use super::traits::{public_url, ObjectStore};

/// Stores objects as files under `<root>/<bucket>/`.
///
/// Keeps the write-once contract of the cloud store; metadata is not kept.
pub struct FsObjectStore {
    dir: PathBuf,
    bucket: String,
    public_host: String,
}

impl FsObjectStore {
    pub fn new(root: &Path, bucket: &str, public_host: &str) -> Self {
        Self {
            dir: root.join(bucket),
            bucket: bucket.to_string(),
            public_host: public_host.to_string(),
        }
    }

    /// Create the bucket directory if needed.
    pub async fn connect(root: &Path, bucket: &str, public_host: &str) -> Result<Self, StorageError> {
        let store = Self::new(root, bucket, public_host);
        tokio::fs::create_dir_all(&store.dir).await?;
        Ok(store)
    }

    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

/// Write a freshly created object, removing it again if the write fails.
///
/// A partial file would otherwise pass as an already stored object.
async fn write_or_remove<W>(path: &Path, writer: &mut W, bytes: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %remove_err, "Failed to remove partial object");
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        write_or_remove(&path, &mut file, &bytes).await?;
        debug!(path = %path.display(), size_bytes = bytes.len(), "Object written");
        Ok(())
    }

    async fn set_metadata(
        &self,
        _key: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        Err(StorageError::MetadataUnsupported(self.name().to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.public_host, &self.bucket, key)
    }

    fn supports_metadata(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PNG_CONTENT_TYPE;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts nothing; every write fails like a full disk.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_put_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::connect(dir.path(), "images", "localhost")
            .await
            .unwrap();

        store
            .put_object("id_0.png", vec![1, 2, 3], PNG_CONTENT_TYPE)
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("images").join("id_0.png")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
        assert_eq!(store.public_url("id_0.png"), "https://localhost/images/id_0.png");
    }

    #[tokio::test]
    async fn test_put_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::connect(dir.path(), "images", "localhost")
            .await
            .unwrap();
        store.put_object("k.png", vec![1], PNG_CONTENT_TYPE).await.unwrap();

        let err = store
            .put_object("k.png", vec![2], PNG_CONTENT_TYPE)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        let kept = std::fs::read(dir.path().join("images").join("k.png")).unwrap();
        assert_eq!(kept, vec![1]);
    }

    #[tokio::test]
    async fn test_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::connect(dir.path(), "images", "localhost")
            .await
            .unwrap();
        let err = store
            .put_object("../escape.png", vec![1], PNG_CONTENT_TYPE)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_metadata_unsupported() {
        let store = FsObjectStore::new(Path::new("/tmp"), "b", "h");
        assert!(!store.supports_metadata());
        assert!(store.set_metadata("k", &HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::connect(dir.path(), "images", "localhost")
            .await
            .unwrap();
        let path = store.object_path("id_0.png").unwrap();
        std::fs::write(&path, b"").unwrap();

        let err = write_or_remove(&path, &mut FullDisk, &[1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!path.exists());

        // A retry of the same key is a fresh write, not "already stored".
        store
            .put_object("id_0.png", vec![1, 2, 3], PNG_CONTENT_TYPE)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }
}
