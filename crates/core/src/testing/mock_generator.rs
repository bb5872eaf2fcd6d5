//! Mock image generator for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};

use crate::generation::{GenerationError, GenerationRequest, ImageGenerator};

/// A finished generation call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedGeneration {
    pub request: GenerationRequest,
    pub started: Instant,
    pub finished: Instant,
}

/// Mock implementation of the ImageGenerator trait.
///
/// Returns small fake PNG buffers. Latency can be simulated, and the mock
/// tracks how many calls overlapped.
#[derive(Debug)]
pub struct MockImageGenerator {
    generations: Arc<RwLock<Vec<RecordedGeneration>>>,
    next_error: Arc<RwLock<Option<GenerationError>>>,
    latency: Arc<RwLock<Duration>>,
    short_by: Arc<RwLock<usize>>,
    held: watch::Sender<bool>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self {
            generations: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            short_by: Arc::new(RwLock::new(0)),
            held: watch::channel(false).0,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Get all recorded calls, in completion order.
    pub async fn recorded_generations(&self) -> Vec<RecordedGeneration> {
        self.generations.read().await.clone()
    }

    /// Get the requests of all recorded calls.
    pub async fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.generations
            .read()
            .await
            .iter()
            .map(|g| g.request.clone())
            .collect()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: GenerationError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated generation duration.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Return `count` fewer images than requested.
    pub async fn set_short_by(&self, count: usize) {
        *self.short_by.write().await = count;
    }

    /// Make calls wait until [`release`](Self::release), like a hung backend.
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    /// Let held calls return.
    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Number of calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Fake image bytes for `index`.
    pub fn fake_image(index: usize) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&(index as u32).to_be_bytes());
        bytes
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Vec<u8>>, GenerationError> {
        let started = Instant::now();
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let mut held = self.held.subscribe();
        // The sender lives in `self`.
        let _ = held.wait_for(|held| !held).await;

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.generations.write().await.push(RecordedGeneration {
            request: request.clone(),
            started,
            finished: Instant::now(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let count = (request.image_count as usize).saturating_sub(*self.short_by.read().await);
        Ok((0..count).map(Self::fake_image).collect())
    }
}
