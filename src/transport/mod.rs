//! Transport Adapters
//!
//! Concrete [`Connection`](crate::hub::Connection) implementations:
//!
//! - [`memory`]: in-process pair, for tests and embedding
//! - [`websocket`]: axum WebSocket, used by the server

pub mod memory;
pub mod websocket;

pub use memory::{MemoryConnection, MemoryPeer};
pub use websocket::WsConnection;
