//! Connection Hub
//!
//! Owns the connection registry and the processor table, spawns one receive
//! loop per connection and runs the broadcast loop.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::broadcast;
use super::connection::{Connection, ConnectionHandle, ConnectionId};
use super::envelope::Envelope;
use super::error::{HubError, HubResult, ProcessorError};
use super::listener;
use super::processor::{FnProcessor, Processor, ProcessorTable};

/// Configuration for the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the broadcast queue; `broadcast()` waits while it is full
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Consecutive failed broadcast sends before a connection is reported as failing
    #[serde(default = "default_send_failure_warn_threshold")]
    pub send_failure_warn_threshold: u32,
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_send_failure_warn_threshold() -> u32 {
    3
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
            send_failure_warn_threshold: default_send_failure_warn_threshold(),
        }
    }
}

/// Point-in-time hub counters
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub processors: usize,
    pub running: bool,
    pub broadcast_send_failures: u64,
}

/// Multiplexes connections, dispatches their messages and broadcasts to all of them
///
/// `Hub` is a handle; clones share the same registry, processors and queue.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    /// Attached connections: ConnectionId → handle
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
    processors: ProcessorTable,
    broadcast_tx: mpsc::Sender<Envelope>,
    /// Taken by `run()`
    broadcast_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    running: AtomicBool,
    shutdown: CancellationToken,
    config: HubConfig,
}

impl Hub {
    /// Create an idle hub with no connections or processors
    pub fn new(config: HubConfig) -> Self {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_capacity.max(1));

        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                processors: ProcessorTable::new(),
                broadcast_tx,
                broadcast_rx: Mutex::new(Some(broadcast_rx)),
                running: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                config,
            }),
        }
    }

    /// Bind a processor to a message type
    pub fn register_processor<P>(&self, kind: impl Into<String>, processor: P) -> HubResult<()>
    where
        P: Processor + 'static,
    {
        self.inner.processors.register(kind, Arc::new(processor))
    }

    /// Bind an async closure to a message type
    ///
    /// ```rust,no_run
    /// use switchboard::{Envelope, Hub, HubConfig, ProcessorError};
    ///
    /// let hub = Hub::new(HubConfig::default());
    /// hub.register_fn("echo", |_hub, request: Envelope| async move {
    ///     Ok::<_, ProcessorError>(request)
    /// })
    /// .unwrap();
    /// ```
    pub fn register_fn<F, Fut>(&self, kind: impl Into<String>, f: F) -> HubResult<()>
    where
        F: Fn(Hub, Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope, ProcessorError>> + Send + 'static,
    {
        self.register_processor(kind, FnProcessor::new(f))
    }

    pub(crate) fn processors(&self) -> &ProcessorTable {
        &self.inner.processors
    }

    /// Registered message types, sorted
    pub fn processor_types(&self) -> Vec<String> {
        self.inner.processors.types()
    }

    /// Add a connection to the registry
    ///
    /// If the hub is running the connection's receive loop starts right away,
    /// otherwise it starts when [`Hub::run`] is called.
    pub async fn attach(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(ConnectionHandle::new(id.clone(), connection));

        // The running check happens under the write lock so a concurrent
        // run() either sees this entry or we see its flag.
        let mut connections = self.inner.connections.write().await;
        connections.insert(id.clone(), Arc::clone(&handle));
        let running = self.is_running();
        if running {
            self.start_connection(handle);
        }
        drop(connections);

        tracing::info!(connection_id = %id, listening = running, "Connection attached");
        id
    }

    /// Close a connection and remove it from the registry
    ///
    /// If the transport fails to close, the entry is kept and the error is
    /// returned: a registry that still lists a dead connection is preferable
    /// to one that has lost a live one.
    pub async fn close(&self, id: &str) -> HubResult<()> {
        let handle = self
            .inner
            .connections
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| HubError::ConnectionNotFound(id.to_string()))?;

        match handle.connection.close().await {
            Ok(()) => {
                self.inner.connections.write().await.remove(id);
                tracing::info!(connection_id = %id, "Connection closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Error closing connection");
                Err(HubError::Close {
                    id: id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Queue an envelope for delivery to every attached connection
    ///
    /// Returns once the envelope is queued, not once it is delivered. Waits
    /// while the queue is full.
    pub async fn broadcast(&self, envelope: Envelope) -> HubResult<()> {
        self.inner
            .broadcast_tx
            .send(envelope)
            .await
            .map_err(|_| HubError::BroadcastClosed)
    }

    /// Start every attached connection and run the broadcast loop
    ///
    /// Returns after [`Hub::shutdown`]. A hub runs at most once.
    pub async fn run(&self) -> HubResult<()> {
        let mut queue = self
            .inner
            .broadcast_rx
            .lock()
            .await
            .take()
            .ok_or(HubError::AlreadyRunning)?;

        let attached = {
            let connections = self.inner.connections.write().await;
            self.inner.running.store(true, Ordering::SeqCst);
            for handle in connections.values() {
                self.start_connection(Arc::clone(handle));
            }
            connections.len()
        };

        tracing::info!(
            connections = attached,
            processors = self.inner.processors.len(),
            "Hub running"
        );

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                message = queue.recv() => match message {
                    Some(envelope) => self.fan_out(envelope).await,
                    None => break,
                },
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("Hub stopped");
        Ok(())
    }

    /// Stop the broadcast loop and close every attached connection
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        for id in self.connection_ids().await {
            // Close failures are logged by close() and leave the entry in place
            let _ = self.close(&id).await;
        }

        tracing::info!("Hub shut down");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub async fn is_attached(&self, id: &str) -> bool {
        self.inner.connections.read().await.contains_key(id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.connections.read().await.keys().cloned().collect()
    }

    pub async fn stats(&self) -> HubStats {
        let connections = self.inner.connections.read().await;

        HubStats {
            connections: connections.len(),
            processors: self.inner.processors.len(),
            running: self.is_running(),
            broadcast_send_failures: connections.values().map(|h| h.total_failures()).sum(),
        }
    }

    /// Snapshot of the registry for one fan-out
    pub(crate) async fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.inner.connections.read().await.values().cloned().collect()
    }

    fn start_connection(&self, handle: Arc<ConnectionHandle>) {
        if let Some(outbox) = handle.take_outbox() {
            tokio::spawn(broadcast::write_outbox(
                Arc::downgrade(&handle),
                outbox,
                self.inner.config.send_failure_warn_threshold,
            ));
        }
        tokio::spawn(listener::listen(self.clone(), handle));
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.broadcast_capacity, 64);
        assert_eq!(config.send_failure_warn_threshold, 3);
    }

    #[tokio::test]
    async fn test_new_hub_is_idle() {
        let hub = Hub::default();
        assert!(!hub.is_running());
        assert_eq!(hub.connection_count().await, 0);
        assert!(hub.processor_types().is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_processor() {
        let hub = Hub::default();
        hub.register_fn("echo", |_hub, request: Envelope| async move {
            Ok::<_, ProcessorError>(request)
        })
        .unwrap();

        let result = hub.register_fn("echo", |_hub, request: Envelope| async move {
            Ok::<_, ProcessorError>(request)
        });

        assert!(matches!(result, Err(HubError::AlreadyRegistered(_))));
        assert_eq!(hub.processor_types(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_attach_adds_to_registry() {
        let hub = Hub::default();
        let (conn, _peer) = memory::pair();

        let id = hub.attach(Arc::new(conn)).await;

        assert!(hub.is_attached(&id).await);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_attach_same_transport_twice_gives_two_entries() {
        let hub = Hub::default();
        let (conn, _peer) = memory::pair();
        let conn: Arc<dyn Connection> = Arc::new(conn);

        let first = hub.attach(Arc::clone(&conn)).await;
        let second = hub.attach(conn).await;

        assert_ne!(first, second);
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_close_removes_from_registry() {
        let hub = Hub::default();
        let (conn, peer) = memory::pair();

        let id = hub.attach(Arc::new(conn)).await;
        hub.close(&id).await.unwrap();

        assert!(peer.is_closed());
        assert!(!hub.is_attached(&id).await);
    }

    #[tokio::test]
    async fn test_close_unknown_connection() {
        let hub = Hub::default();
        let result = hub.close("missing").await;
        assert!(matches!(result, Err(HubError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let hub = Hub::default();
        let runner = hub.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        timeout(Duration::from_secs(1), async {
            while !hub.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(matches!(hub.run().await, Err(HubError::AlreadyRunning)));

        hub.shutdown().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_and_closes_connections() {
        let hub = Hub::default();
        let (conn, peer) = memory::pair();
        hub.attach(Arc::new(conn)).await;

        let runner = hub.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        hub.shutdown().await;

        let result = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(!hub.is_running());
        assert!(peer.is_closed());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_after_stop_fails() {
        let hub = Hub::default();
        let runner = hub.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        hub.shutdown().await;
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap().unwrap();

        let result = hub.broadcast(Envelope::new("late", "x")).await;
        assert!(matches!(result, Err(HubError::BroadcastClosed)));
    }

    #[tokio::test]
    async fn test_stats() {
        let hub = Hub::default();
        let (conn, _peer) = memory::pair();
        hub.attach(Arc::new(conn)).await;
        hub.register_fn("echo", |_hub, request: Envelope| async move {
            Ok::<_, ProcessorError>(request)
        })
        .unwrap();

        let stats = hub.stats().await;
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.processors, 1);
        assert!(!stats.running);
        assert_eq!(stats.broadcast_send_failures, 0);
    }
}
