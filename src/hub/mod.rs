//! Message Hub
//!
//! Transport-agnostic core: multiplexes many connections, routes each inbound
//! envelope to the processor registered for its type, and broadcasts
//! envelopes to every attached connection.
//!
//! ## Architecture
//!
//! - **Envelope**: `{ type, time, payload }` message model
//! - **Connection**: what a transport must provide (receive, send, close)
//! - **ProcessorTable**: message type → processor, registered once
//! - **Hub**: registry, processors, broadcast queue and lifecycle
//! - **Receive loop**: one task per connection, strict request/response
//! - **Broadcast loop**: drains the queue and fans out to all connections
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchboard::transport::memory;
//! use switchboard::{Envelope, Hub, HubConfig, ProcessorError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::new(HubConfig::default());
//!     hub.register_fn("echo", |_hub, request: Envelope| async move {
//!         Ok::<_, ProcessorError>(request)
//!     })?;
//!
//!     let (conn, mut peer) = memory::pair();
//!     hub.attach(Arc::new(conn)).await;
//!
//!     let runner = hub.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     peer.send(&Envelope::new("echo", "hello"))?;
//!     let response = peer.recv().await;
//!     println!("{:?}", response);
//!     Ok(())
//! }
//! ```

mod broadcast;
mod connection;
mod envelope;
mod error;
#[allow(clippy::module_inception)]
mod hub;
mod listener;
mod processor;

pub use connection::{Connection, ConnectionId};
pub use envelope::{Envelope, ERROR_TYPE, UNKNOWN_MESSAGE_TYPE};
pub use error::{ConnectionError, HubError, HubResult, ProcessorError};
pub use hub::{Hub, HubConfig, HubStats};
pub use processor::{FnProcessor, Processor, ProcessorTable};
