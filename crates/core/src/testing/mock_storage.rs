//! Mock object store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{public_url, ObjectStore, StorageError};

/// Mock implementation of the ObjectStore trait.
///
/// Keeps objects in memory with write-once semantics. Failures are injected
/// per key; latency can be simulated to observe concurrent deliveries.
#[derive(Debug)]
pub struct MockObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    metadata: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    puts: Arc<RwLock<Vec<String>>>,
    put_failures: Arc<RwLock<HashMap<String, StorageError>>>,
    latency: Arc<RwLock<Duration>>,
    supports_metadata: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    pub const BUCKET: &'static str = "mock-bucket";
    pub const HOST: &'static str = "storage.test";

    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            metadata: Arc::new(RwLock::new(HashMap::new())),
            puts: Arc::new(RwLock::new(Vec::new())),
            put_failures: Arc::new(RwLock::new(HashMap::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            supports_metadata: true,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A store that, like the filesystem backend, keeps no metadata.
    pub fn without_metadata() -> Self {
        Self {
            supports_metadata: false,
            ..Self::new()
        }
    }

    /// Keys written by successful puts, in order.
    pub async fn recorded_puts(&self) -> Vec<String> {
        self.puts.read().await.clone()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        self.metadata.read().await.get(key).cloned()
    }

    /// Store an object without recording a put.
    pub async fn insert_existing(&self, key: &str, bytes: Vec<u8>) {
        self.objects.write().await.insert(key.to_string(), bytes);
    }

    /// Fail the put of `key`.
    pub async fn fail_put(&self, key: &str, error: StorageError) {
        self.put_failures
            .write()
            .await
            .insert(key.to_string(), error);
    }

    /// Set the simulated upload duration.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Highest number of uploads that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.put_failures.write().await.remove(key) {
            return Err(error);
        }

        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), bytes);
        self.puts.write().await.push(key.to_string());
        Ok(())
    }

    async fn set_metadata(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        if !self.supports_metadata {
            return Err(StorageError::MetadataUnsupported(self.name().to_string()));
        }
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::Status {
                status: 404,
                body: format!("No such object: {}", key),
            });
        }
        self.metadata
            .write()
            .await
            .insert(key.to_string(), metadata.clone());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url(Self::HOST, Self::BUCKET, key)
    }

    fn supports_metadata(&self) -> bool {
        self.supports_metadata
    }
}
