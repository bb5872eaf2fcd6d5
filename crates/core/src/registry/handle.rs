use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chat::ChatClient;
use crate::queue::JobQueue;
use crate::storage::ObjectStore;

/// Errors surfaced by client handles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A second construction was attempted for the same client.
    #[error("Client {0} was already initialized")]
    AlreadyInitialized(&'static str),

    /// The single construction attempt failed.
    #[error("Client {client} failed to construct: {reason}")]
    ConstructionFailed {
        client: &'static str,
        reason: String,
    },
}

/// Report of a failed client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub client: &'static str,
    pub reason: String,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} client failed to construct: {}", self.client, self.reason)
    }
}

/// Receives the first fatal construction failure of any handle in a registry.
pub struct FatalSignal {
    rx: mpsc::UnboundedReceiver<FatalError>,
}

impl FatalSignal {
    /// Wait for a construction failure.
    ///
    /// Returns `None` once every handle of the registry has been dropped.
    pub async fn recv(&mut self) -> Option<FatalError> {
        self.rx.recv().await
    }
}

enum Slot<T: ?Sized> {
    Pending,
    Ready(Arc<T>),
    Failed(String),
}

struct Inner<T: ?Sized> {
    name: &'static str,
    slot: watch::Sender<Slot<T>>,
    started: AtomicBool,
    fatal: mpsc::UnboundedSender<FatalError>,
}

/// Write-once, read-many holder for a process-wide client.
///
/// Cheaply cloneable; every clone observes the same client.
pub struct ReadyHandle<T: ?Sized> {
    inner: Arc<Inner<T>>,
}

impl<T: ?Sized> Clone for ReadyHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> ReadyHandle<T> {
    fn new(name: &'static str, fatal: mpsc::UnboundedSender<FatalError>) -> Self {
        let (slot, _) = watch::channel(Slot::Pending);
        Self {
            inner: Arc::new(Inner {
                name,
                slot,
                started: AtomicBool::new(false),
                fatal,
            }),
        }
    }

    /// Name used in logs and readiness reports.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Start the one construction attempt for this client in the background.
    ///
    /// On failure the handle is poisoned (every waiter gets
    /// [`RegistryError::ConstructionFailed`]) and the failure is reported on
    /// the registry's [`FatalSignal`]. There is no retry.
    pub fn initialize<F, E>(&self, construct: F) -> Result<JoinHandle<()>, RegistryError>
    where
        F: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.claim()?;
        let inner = Arc::clone(&self.inner);

        Ok(tokio::spawn(async move {
            match construct.await {
                Ok(client) => {
                    info!(client = inner.name, "Client ready");
                    inner.slot.send_replace(Slot::Ready(client));
                }
                Err(e) => {
                    let reason = e.to_string();
                    error!(client = inner.name, error = %reason, "Client construction failed");
                    inner.slot.send_replace(Slot::Failed(reason.clone()));
                    let _ = inner.fatal.send(FatalError {
                        client: inner.name,
                        reason,
                    });
                }
            }
        }))
    }

    /// Mark the handle ready with an already constructed client.
    ///
    /// Counts as the single construction attempt.
    pub fn install(&self, client: Arc<T>) -> Result<(), RegistryError> {
        self.claim()?;
        self.inner.slot.send_replace(Slot::Ready(client));
        Ok(())
    }

    /// Wait until the client is constructed and return it.
    ///
    /// Suspends only the calling task; the wait is driven by a change
    /// notification, not by polling.
    pub async fn ready(&self) -> Result<Arc<T>, RegistryError> {
        let mut rx = self.inner.slot.subscribe();
        let slot = match rx.wait_for(|slot| !matches!(slot, Slot::Pending)).await {
            Ok(slot) => slot,
            // The sender lives in `inner`, which `self` keeps alive.
            Err(_) => {
                return Err(RegistryError::ConstructionFailed {
                    client: self.inner.name,
                    reason: "handle closed".to_string(),
                })
            }
        };

        match &*slot {
            Slot::Ready(client) => Ok(Arc::clone(client)),
            Slot::Failed(reason) => Err(RegistryError::ConstructionFailed {
                client: self.inner.name,
                reason: reason.clone(),
            }),
            Slot::Pending => Err(RegistryError::ConstructionFailed {
                client: self.inner.name,
                reason: "still pending".to_string(),
            }),
        }
    }

    /// The client, if it is already constructed.
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.inner.slot.borrow() {
            Slot::Ready(client) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.inner.slot.borrow(), Slot::Ready(_))
    }

    fn claim(&self) -> Result<(), RegistryError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::AlreadyInitialized(self.inner.name));
        }
        Ok(())
    }
}

/// Readiness of each registered client, for health reporting.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ClientReadiness {
    pub queue: bool,
    pub storage: bool,
    pub chat: bool,
}

impl ClientReadiness {
    pub fn all_ready(&self) -> bool {
        self.queue && self.storage && self.chat
    }
}

/// The three process-wide client handles.
#[derive(Clone)]
pub struct ClientRegistry {
    queue: ReadyHandle<dyn JobQueue>,
    storage: ReadyHandle<dyn ObjectStore>,
    chat: ReadyHandle<dyn ChatClient>,
}

impl ClientRegistry {
    /// Create a registry with all handles pending.
    pub fn new() -> (Self, FatalSignal) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            queue: ReadyHandle::new("queue", tx.clone()),
            storage: ReadyHandle::new("storage", tx.clone()),
            chat: ReadyHandle::new("chat", tx),
        };
        (registry, FatalSignal { rx })
    }

    /// Create a registry whose handles are ready immediately.
    pub fn with_clients(
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn ObjectStore>,
        chat: Arc<dyn ChatClient>,
    ) -> (Self, FatalSignal) {
        let (registry, fatal) = Self::new();
        // Fresh handles cannot already be claimed.
        let _ = registry.queue.install(queue);
        let _ = registry.storage.install(storage);
        let _ = registry.chat.install(chat);
        (registry, fatal)
    }

    pub fn queue(&self) -> &ReadyHandle<dyn JobQueue> {
        &self.queue
    }

    pub fn storage(&self) -> &ReadyHandle<dyn ObjectStore> {
        &self.storage
    }

    pub fn chat(&self) -> &ReadyHandle<dyn ChatClient> {
        &self.chat
    }

    pub fn readiness(&self) -> ClientReadiness {
        ClientReadiness {
            queue: self.queue.is_ready(),
            storage: self.storage.is_ready(),
            chat: self.chat.is_ready(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready};

    #[derive(Debug)]
    struct Client(u32);

    fn handle() -> (ReadyHandle<Client>, FatalSignal) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReadyHandle::new("test", tx), FatalSignal { rx })
    }

    #[tokio::test]
    async fn test_ready_after_construction() {
        let (handle, _fatal) = handle();
        let join = handle
            .initialize(async { Ok::<_, String>(Arc::new(Client(7))) })
            .unwrap();
        join.await.unwrap();

        let client = handle.ready().await.unwrap();
        assert_eq!(client.0, 7);
        assert!(handle.is_ready());
        assert_eq!(handle.get().map(|c| c.0), Some(7));
    }

    #[tokio::test]
    async fn test_waiter_is_suspended_until_ready() {
        let (handle, _fatal) = handle();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        handle
            .initialize(async move {
                let _ = release_rx.await;
                Ok::<_, String>(Arc::new(Client(1)))
            })
            .unwrap();

        let mut waiter = tokio_test::task::spawn(handle.ready());
        assert_pending!(waiter.poll());
        assert!(!handle.is_ready());

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !handle.is_ready() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(waiter.is_woken());
        let client = assert_ready!(waiter.poll()).unwrap();
        assert_eq!(client.0, 1);
    }

    #[tokio::test]
    async fn test_many_waiters_share_one_client() {
        let (handle, _fatal) = handle();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        handle
            .initialize(async move {
                let _ = release_rx.await;
                Ok::<_, String>(Arc::new(Client(3)))
            })
            .unwrap();

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.ready().await })
            })
            .collect();

        release_tx.send(()).unwrap();
        let mut clients = Vec::new();
        for waiter in waiters {
            clients.push(waiter.await.unwrap().unwrap());
        }
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
    }

    #[tokio::test]
    async fn test_construction_failure_is_fatal() {
        let (handle, mut fatal) = handle();
        handle
            .initialize(async { Err::<Arc<Client>, _>("connection refused") })
            .unwrap();

        let err = handle.ready().await.err().unwrap();
        assert!(matches!(err, RegistryError::ConstructionFailed { client: "test", .. }));

        let report = fatal.recv().await.unwrap();
        assert_eq!(report.client, "test");
        assert_eq!(report.reason, "connection refused");
        assert!(!handle.is_ready());
    }

    #[tokio::test]
    async fn test_only_one_construction_attempt() {
        let (handle, _fatal) = handle();
        handle
            .initialize(async { Ok::<_, String>(Arc::new(Client(1))) })
            .unwrap();

        let second = handle.initialize(async { Ok::<_, String>(Arc::new(Client(2))) });
        assert!(matches!(second, Err(RegistryError::AlreadyInitialized("test"))));
        assert!(matches!(
            handle.install(Arc::new(Client(3))),
            Err(RegistryError::AlreadyInitialized("test"))
        ));

        assert_eq!(handle.ready().await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn test_registry_readiness() {
        let (registry, _fatal) = ClientRegistry::new();
        let readiness = registry.readiness();
        assert!(!readiness.queue);
        assert!(!readiness.storage);
        assert!(!readiness.chat);
        assert!(!readiness.all_ready());
        assert_eq!(registry.queue().name(), "queue");
        assert_eq!(registry.storage().name(), "storage");
        assert_eq!(registry.chat().name(), "chat");
    }
}
