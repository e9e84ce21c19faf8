//! Connection Capability
//!
//! The contract a transport adapter fulfils so the hub can drive it, plus the
//! registry entry the hub keeps for each attached connection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::envelope::Envelope;
use super::error::ConnectionError;

/// Unique identifier assigned to a connection on attach
pub type ConnectionId = String;

/// A bidirectional, message-oriented transport
///
/// `receive` and `send` may be called concurrently from different tasks; the
/// hub serializes `send` calls per connection itself.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Wait for the next complete envelope
    async fn receive(&self) -> Result<Envelope, ConnectionError>;

    /// Transmit one envelope
    async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError>;

    /// Release transport resources
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Registry entry for an attached connection
pub(crate) struct ConnectionHandle {
    pub id: ConnectionId,
    pub connection: Arc<dyn Connection>,
    /// Held for the duration of every `send`, so responses and broadcasts
    /// reach the transport one at a time and in order
    send_lock: Mutex<()>,
    /// Broadcast outbox, drained by the connection's writer task
    outbox: mpsc::UnboundedSender<Envelope>,
    outbox_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, connection: Arc<dyn Connection>) -> Self {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();

        Self {
            id,
            connection,
            send_lock: Mutex::new(()),
            outbox,
            outbox_rx: std::sync::Mutex::new(Some(outbox_rx)),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Send under the per-connection lock
    pub async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        let _guard = self.send_lock.lock().await;
        self.connection.send(envelope).await
    }

    /// Queue a broadcast envelope for the writer task
    ///
    /// Returns false if the writer task has already exited.
    pub fn enqueue(&self, envelope: Envelope) -> bool {
        self.outbox.send(envelope).is_ok()
    }

    /// Take the outbox receiver; only the first caller gets it
    pub fn take_outbox(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.outbox_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Record a failed broadcast send, returning the consecutive count
    pub fn record_failure(&self) -> u32 {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;

    #[tokio::test]
    async fn test_handle_send_reaches_peer() {
        let (conn, mut peer) = memory::pair();
        let handle = ConnectionHandle::new("c1".to_string(), Arc::new(conn));

        handle.send(&Envelope::new("ping", "x")).await.unwrap();

        let received = peer.recv().await.unwrap();
        assert_eq!(received.kind, "ping");
    }

    #[test]
    fn test_outbox_taken_once() {
        let (conn, _peer) = memory::pair();
        let handle = ConnectionHandle::new("c1".to_string(), Arc::new(conn));

        assert!(handle.take_outbox().is_some());
        assert!(handle.take_outbox().is_none());
    }

    #[test]
    fn test_failure_counters() {
        let (conn, _peer) = memory::pair();
        let handle = ConnectionHandle::new("c1".to_string(), Arc::new(conn));

        assert_eq!(handle.record_failure(), 1);
        assert_eq!(handle.record_failure(), 2);
        handle.record_success();
        assert_eq!(handle.record_failure(), 1);
        assert_eq!(handle.total_failures(), 3);
    }
}
