use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::types::{DispatchItem, WorkerStats};
use crate::chat::ChatClient;
use crate::delivery::{DeliveryError, DeliveryReport, DeliveryWorker};
use crate::generation::{GenerationError, GenerationRequest, ImageGenerator};
use crate::job::GeneratedArtifact;
use crate::metrics;
use crate::status::StatusMessage;

/// Handle of a spawned delivery task.
///
/// Nothing in the pipeline awaits it; it is returned for observation only.
pub type DeliveryHandle = JoinHandle<Result<DeliveryReport, DeliveryError>>;

/// Single-concurrency consumer of the generation backend.
pub struct GenerationDispatcher {
    generator: Arc<dyn ImageGenerator>,
    chat: Arc<dyn ChatClient>,
    delivery: DeliveryWorker,
    width: u32,
    height: u32,
    stats: Arc<WorkerStats>,
}

impl GenerationDispatcher {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        chat: Arc<dyn ChatClient>,
        delivery: DeliveryWorker,
        width: u32,
        height: u32,
    ) -> Self {
        Self::with_stats(generator, chat, delivery, width, height, Arc::default())
    }

    pub(crate) fn with_stats(
        generator: Arc<dyn ImageGenerator>,
        chat: Arc<dyn ChatClient>,
        delivery: DeliveryWorker,
        width: u32,
        height: u32,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            generator,
            chat,
            delivery,
            width,
            height,
            stats,
        }
    }

    /// Take jobs off the hand-off channel one at a time until it closes or
    /// shutdown is signalled.
    ///
    /// Shutdown is only observed between jobs; a generation call in progress
    /// runs to completion.
    pub async fn run(
        &self,
        mut handoff: mpsc::Receiver<DispatchItem>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Dispatcher started");
        loop {
            let item = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Dispatcher received shutdown signal");
                    break;
                }
                item = handoff.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            // The returned handle is deliberately not awaited.
            let _ = self.process_one(item).await;
        }
        info!("Dispatcher stopped");
    }

    /// Generate one job and spawn its delivery.
    ///
    /// Returns once the generation call has returned; delivery continues in
    /// the background. `None` when generation failed.
    pub async fn process_one(&self, item: DispatchItem) -> Option<DeliveryHandle> {
        let DispatchItem { job, token } = item;
        let correlation_id = *job.correlation_id();
        let mut status = StatusMessage::resume(Arc::clone(&self.chat), token.clone(), &job);

        if let Err(e) = status.mark_generating().await {
            warn!(correlation_id = %correlation_id, error = %e, "Unexpected status transition");
        }
        *self.stats.current_job.write().await = Some(correlation_id);

        let request = GenerationRequest {
            prompt: job.prompt().to_string(),
            image_count: job.requested_images(),
            width: self.width,
            height: self.height,
        };
        info!(
            correlation_id = %correlation_id,
            image_count = request.image_count,
            generator = self.generator.name(),
            "Generating"
        );

        let started = Instant::now();
        let result = self
            .generator
            .generate(&request)
            .await
            .and_then(|images| {
                GenerationError::check_count(request.image_count, &images)?;
                Ok(images)
            });
        let elapsed = started.elapsed().as_secs_f64();
        *self.stats.current_job.write().await = None;

        let images = match result {
            Ok(images) => {
                metrics::GENERATIONS.with_label_values(&["success"]).inc();
                metrics::GENERATION_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                WorkerStats::bump(&self.stats.generated);
                images
            }
            Err(e) => {
                metrics::GENERATIONS.with_label_values(&["failed"]).inc();
                metrics::GENERATION_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                WorkerStats::bump(&self.stats.failed);
                warn!(correlation_id = %correlation_id, error = %e, "Generation failed");
                if let Err(e) = status.mark_errored().await {
                    warn!(correlation_id = %correlation_id, error = %e, "Unexpected status transition");
                }
                return None;
            }
        };

        let artifacts = GeneratedArtifact::from_images(&job, images);
        let delivery = self.delivery.clone();
        let stats = Arc::clone(&self.stats);

        stats.deliveries_in_flight.fetch_add(1, Ordering::Relaxed);
        metrics::DELIVERIES_IN_FLIGHT.inc();

        Some(tokio::spawn(async move {
            let result = delivery
                .deliver(&job, artifacts, &mut status, &token)
                .await;

            stats.deliveries_in_flight.fetch_sub(1, Ordering::Relaxed);
            metrics::DELIVERIES_IN_FLIGHT.dec();
            match &result {
                Ok(_) => WorkerStats::bump(&stats.deliveries_completed),
                Err(_) => WorkerStats::bump(&stats.deliveries_failed),
            }
            result
        }))
    }
}
