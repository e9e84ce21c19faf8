//! In-Process Transport
//!
//! A JSON-framed duplex pair. The [`MemoryConnection`] half is attached to a
//! hub; the [`MemoryPeer`] half plays the remote client.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::hub::{Connection, ConnectionError, Envelope};

/// Create a connected pair
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (to_hub_tx, to_hub_rx) = mpsc::unbounded_channel();
    let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let connection = MemoryConnection {
        inbound: Mutex::new(to_hub_rx),
        outbound: to_peer_tx,
        closed: closed.clone(),
    };
    let peer = MemoryPeer {
        outbound: to_hub_tx,
        inbound: to_peer_rx,
        closed,
    };

    (connection, peer)
}

/// Hub-side half of an in-process pair
pub struct MemoryConnection {
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn receive(&self) -> Result<Envelope, ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        let mut inbound = self.inbound.lock().await;
        let frame = tokio::select! {
            _ = self.closed.cancelled() => return Err(ConnectionError::Closed),
            frame = inbound.recv() => frame.ok_or(ConnectionError::Closed)?,
        };

        Ok(serde_json::from_str(&frame)?)
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        let frame = serde_json::to_string(envelope)?;
        self.outbound
            .send(frame)
            .map_err(|_| ConnectionError::Closed)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closed.cancel();
        Ok(())
    }
}

/// Client-side half of an in-process pair
pub struct MemoryPeer {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
}

impl MemoryPeer {
    /// Send an envelope to the hub side
    pub fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        let frame = serde_json::to_string(envelope)?;
        self.send_raw(frame)
    }

    /// Send a raw frame, bypassing encoding
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        self.outbound
            .send(frame.into())
            .map_err(|_| ConnectionError::Closed)
    }

    /// Wait for the next envelope from the hub side
    ///
    /// Frames already sent before a close are still delivered.
    pub async fn recv(&mut self) -> Result<Envelope, ConnectionError> {
        let frame = tokio::select! {
            biased;
            frame = self.inbound.recv() => frame,
            _ = self.closed.cancelled() => None,
        };
        let frame = match frame {
            Some(frame) => frame,
            None => self
                .inbound
                .try_recv()
                .map_err(|_| ConnectionError::Closed)?,
        };

        Ok(serde_json::from_str(&frame)?)
    }

    /// Sever the pair, as if the remote end went away
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
