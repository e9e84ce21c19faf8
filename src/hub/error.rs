//! Hub error types
//!
//! Errors raised by the hub itself, by transports, and by processors.

use thiserror::Error;

use super::connection::ConnectionId;

/// Errors returned by [`Hub`](super::Hub) operations
#[derive(Error, Debug)]
pub enum HubError {
    /// A processor is already bound to this message type
    #[error("Processor already registered for message type '{0}'")]
    AlreadyRegistered(String),

    /// No attached connection has this id
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The transport failed to close; the connection stays registered
    #[error("Failed to close connection {id}: {source}")]
    Close {
        id: ConnectionId,
        #[source]
        source: ConnectionError,
    },

    /// The broadcast loop is not accepting envelopes anymore
    #[error("Broadcast queue closed")]
    BroadcastClosed,

    /// `run()` was called while the hub is already running
    #[error("Hub is already running")]
    AlreadyRunning,
}

/// Errors reported by a [`Connection`](super::Connection)
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The connection is closed
    #[error("Connection is closed")]
    Closed,

    /// Envelope could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Underlying transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure reported by a processor
///
/// The message is sent verbatim as the payload of an `"error"` envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<HubError> for ProcessorError {
    fn from(err: HubError) -> Self {
        ProcessorError::new(err.to_string())
    }
}

/// Result type alias for hub operations
pub type HubResult<T> = Result<T, HubError>;
