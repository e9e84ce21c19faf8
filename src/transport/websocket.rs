//! WebSocket Transport
//!
//! Adapts an axum [`WebSocket`] to the hub's [`Connection`] contract. Each
//! envelope travels as one JSON text frame.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::hub::{Connection, ConnectionError, Envelope};

/// A WebSocket attached to a hub
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    /// Set once either side has closed the socket
    closed: AtomicBool,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();

        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    fn mark_closed(&self) -> ConnectionError {
        self.closed.store(true, Ordering::SeqCst);
        ConnectionError::Closed
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn receive(&self) -> Result<Envelope, ConnectionError> {
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Binary(bytes))) => return Ok(serde_json::from_slice(&bytes)?),
                // Axum answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(self.mark_closed()),
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(ConnectionError::Transport(e.to_string()));
                }
            }
        }
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }

        let text = serde_json::to_string(envelope)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // A socket the peer already closed has nothing left to release
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }
}
