//! # Switchboard
//!
//! In-process message hub: multiplexes many bidirectional, message-oriented
//! connections, routes every inbound envelope to the processor registered for
//! its type, and broadcasts envelopes to every attached connection.
//!
//! ## Features
//!
//! - **Transport-agnostic core**: anything that can receive, send and close
//!   envelopes can be attached
//! - **Named processors**: one handler per message type, registered once
//! - **Strict request/response**: one response per request, in order, per connection
//! - **Broadcast**: FIFO queue fanned out to every connection
//! - **WebSocket server**: Axum front end for the hub
//!
//! ## Modules
//!
//! - [`hub`]: envelope, connection contract, processor table, hub
//! - [`transport`]: in-process and WebSocket connections
//! - [`processors`]: built-in `echo` and `broadcast` processors
//! - [`server`]: HTTP/WebSocket server
//! - [`config`]: configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchboard::{processors, server, Config, Hub};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!
//!     let hub = Hub::new(config.hub.clone());
//!     processors::register_builtin(&hub)?;
//!
//!     // Runs the hub and serves /ws until Ctrl+C
//!     server::serve(hub, &config.server).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod hub;
pub mod logging;
pub mod processors;
pub mod server;
pub mod transport;

// Re-export top-level types for convenience
pub use hub::{
    Connection, ConnectionError, ConnectionId, Envelope, FnProcessor, Hub, HubConfig, HubError,
    HubResult, HubStats, Processor, ProcessorError, ProcessorTable, ERROR_TYPE,
    UNKNOWN_MESSAGE_TYPE,
};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};

pub use server::{build_router, serve, ServerError};
