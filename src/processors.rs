//! Built-in Processors
//!
//! Processors the server binary registers out of the box:
//! - `echo` - answers with the request unchanged
//! - `broadcast` - relays the payload to every connection and acknowledges

use async_trait::async_trait;
use serde_json::Value;

use crate::hub::{Envelope, Hub, HubResult, Processor, ProcessorError};

/// Message type of envelopes relayed by [`BroadcastProcessor`]
pub const BROADCAST_TYPE: &str = "broadcast";

/// Message type of the acknowledgement sent back to the broadcaster
pub const BROADCAST_ACK_TYPE: &str = "broadcast_ack";

/// Returns the request as the response
pub struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, _hub: &Hub, request: Envelope) -> Result<Envelope, ProcessorError> {
        Ok(request)
    }
}

/// Broadcasts the request payload, then acknowledges the sender
pub struct BroadcastProcessor;

#[async_trait]
impl Processor for BroadcastProcessor {
    async fn process(&self, hub: &Hub, request: Envelope) -> Result<Envelope, ProcessorError> {
        let message = Envelope::new(BROADCAST_TYPE, request.payload).stamped();
        hub.broadcast(message).await?;

        Ok(Envelope::new(BROADCAST_ACK_TYPE, Value::Null))
    }
}

/// Register `echo` and `broadcast` on `hub`
pub fn register_builtin(hub: &Hub) -> HubResult<()> {
    hub.register_processor("echo", EchoProcessor)?;
    hub.register_processor(BROADCAST_TYPE, BroadcastProcessor)?;
    Ok(())
}
