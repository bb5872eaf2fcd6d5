use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use super::dispatcher::GenerationDispatcher;
use super::receiver::{ReceiveLoop, ReceiveOutcome};
use super::types::{DispatchItem, WorkerSettings, WorkerStats, WorkerStatus};
use crate::credentials::CredentialStore;
use crate::delivery::DeliveryWorker;
use crate::generation::ImageGenerator;
use crate::registry::ClientRegistry;

/// Owns the receive loop and the dispatcher.
pub struct PipelineWorker {
    settings: WorkerSettings,
    registry: ClientRegistry,
    credentials: Arc<dyn CredentialStore>,
    generator: Arc<dyn ImageGenerator>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<WorkerStats>,
}

impl PipelineWorker {
    pub fn new(
        settings: WorkerSettings,
        registry: ClientRegistry,
        credentials: Arc<dyn CredentialStore>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            settings,
            registry,
            credentials,
            generator,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            stats: Arc::default(),
        }
    }

    /// Spawn the receive loop and the dispatcher.
    ///
    /// Both wait for the clients they need before touching the queue.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker already running");
            return;
        }
        info!("Starting pipeline worker");

        let (handoff_tx, handoff_rx) = mpsc::channel(self.settings.handoff_capacity.max(1));
        self.spawn_receive_loop(handoff_tx);
        self.spawn_dispatcher(handoff_rx);
    }

    /// Signal both loops to stop.
    ///
    /// A generation call in progress is not interrupted, and spawned
    /// deliveries run to completion.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker not running");
            return;
        }
        info!("Stopping pipeline worker");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> WorkerStatus {
        self.stats.to_status(self.is_running()).await
    }

    fn spawn_receive_loop(&self, handoff_tx: mpsc::Sender<DispatchItem>) {
        let registry = self.registry.clone();
        let credentials = Arc::clone(&self.credentials);
        let stats = Arc::clone(&self.stats);
        let settings = self.settings.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let queue = tokio::select! {
                _ = shutdown_rx.recv() => return,
                queue = registry.queue().ready() => match queue {
                    Ok(queue) => queue,
                    Err(e) => {
                        error!(error = %e, "Receive loop cannot start");
                        return;
                    }
                },
            };

            let receiver = ReceiveLoop::with_stats(
                queue,
                credentials,
                handoff_tx,
                settings.max_messages,
                stats,
            );

            info!("Receive loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Receive loop received shutdown signal");
                        break;
                    }
                    result = receiver.poll_once() => match result {
                        Ok(outcomes) => {
                            if outcomes.contains(&ReceiveOutcome::Closed) {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Pull failed");
                            tokio::time::sleep(settings.pull_retry).await;
                        }
                    },
                }
            }
            info!("Receive loop stopped");
        });
    }

    fn spawn_dispatcher(&self, handoff_rx: mpsc::Receiver<DispatchItem>) {
        let registry = self.registry.clone();
        let generator = Arc::clone(&self.generator);
        let stats = Arc::clone(&self.stats);
        let settings = self.settings.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let clients = tokio::select! {
                _ = shutdown_rx.recv() => return,
                clients = async {
                    let chat = registry.chat().ready().await?;
                    let storage = registry.storage().ready().await?;
                    Ok::<_, crate::registry::RegistryError>((chat, storage))
                } => clients,
            };
            let (chat, storage) = match clients {
                Ok(clients) => clients,
                Err(e) => {
                    error!(error = %e, "Dispatcher cannot start");
                    return;
                }
            };

            let delivery = DeliveryWorker::new(storage, Arc::clone(&chat));
            let dispatcher = GenerationDispatcher::with_stats(
                generator,
                chat,
                delivery,
                settings.width,
                settings.height,
                stats,
            );
            dispatcher.run(handoff_rx, shutdown_rx).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::job::{encode_job, parse_prompt, JobDescriptor};
    use crate::queue::{InMemoryQueue, JobQueue};
    use crate::testing::{
        MockChatClient, MockCredentialStore, MockImageGenerator, MockObjectStore,
    };

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_worker_processes_published_job() {
        let queue = Arc::new(InMemoryQueue::new());
        let chat = Arc::new(MockChatClient::new());
        let storage = Arc::new(MockObjectStore::new());
        let (registry, _fatal) =
            ClientRegistry::with_clients(queue.clone(), storage.clone(), chat.clone());
        let worker = PipelineWorker::new(
            WorkerSettings::default(),
            registry,
            Arc::new(MockCredentialStore::with_user("U42", "xoxp-42")),
            Arc::new(MockImageGenerator::new()),
        );

        worker.start();
        assert!(worker.is_running());

        let job = JobDescriptor::new(parse_prompt("x2 a red fox"), "C1", "1.2", "U42");
        queue.publish(encode_job(&job).unwrap()).await.unwrap();

        let w = &worker;
        wait_for(|| async move { w.status().await.deliveries_completed == 1 }).await;
        let status = worker.status().await;
        assert_eq!(status.jobs_received, 1);
        assert_eq!(status.jobs_generated, 1);
        assert_eq!(status.deliveries_in_flight, 0);
        assert_eq!(storage.recorded_puts().await.len(), 2);

        worker.stop();
        assert!(!worker.is_running());
        assert!(!worker.status().await.running);
    }

    #[tokio::test]
    async fn test_worker_waits_for_clients() {
        let (registry, _fatal) = ClientRegistry::new();
        let worker = PipelineWorker::new(
            WorkerSettings::default(),
            registry.clone(),
            Arc::new(MockCredentialStore::new()),
            Arc::new(MockImageGenerator::new()),
        );
        worker.start();

        let queue = Arc::new(InMemoryQueue::new());
        let job = JobDescriptor::new(parse_prompt("a fox"), "C1", "1.2", "U1");
        queue.publish(encode_job(&job).unwrap()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.status().await.jobs_received, 0);

        registry
            .queue()
            .install(queue.clone() as Arc<dyn JobQueue>)
            .unwrap();
        let w = &worker;
        wait_for(|| async move { w.status().await.jobs_dropped == 1 }).await;
        worker.stop();
    }
}
