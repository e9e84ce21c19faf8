//! Receive Loop
//!
//! One task per attached connection: receive an envelope, dispatch it, send
//! the response, repeat. Any transport failure closes the connection and ends
//! the loop.

use std::sync::Arc;

use super::connection::ConnectionHandle;
use super::envelope::{Envelope, UNKNOWN_MESSAGE_TYPE};
use super::error::HubError;
use super::Hub;

impl Hub {
    /// Produce the response for one inbound envelope
    ///
    /// Unknown types and processor failures become `"error"` envelopes. The
    /// response is returned unstamped.
    pub async fn dispatch(&self, request: Envelope) -> Envelope {
        let Some(processor) = self.processors().lookup(&request.kind) else {
            tracing::debug!(message_type = %request.kind, "No processor for message type");
            return Envelope::error(UNKNOWN_MESSAGE_TYPE);
        };

        let kind = request.kind.clone();
        match processor.process(self, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(message_type = %kind, error = %e, "Processor failed");
                Envelope::error(e.message())
            }
        }
    }
}

/// Run the receive loop for `handle` until its transport fails
pub(crate) async fn listen(hub: Hub, handle: Arc<ConnectionHandle>) {
    tracing::debug!(connection_id = %handle.id, "Receive loop started");

    loop {
        let request = match handle.connection.receive().await {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(connection_id = %handle.id, error = %e, "Receive failed");
                close_after_failure(&hub, &handle).await;
                return;
            }
        };

        let response = hub.dispatch(request).await.stamped();

        if let Err(e) = handle.send(&response).await {
            tracing::debug!(connection_id = %handle.id, error = %e, "Send failed");
            close_after_failure(&hub, &handle).await;
            return;
        }
    }
}

async fn close_after_failure(hub: &Hub, handle: &ConnectionHandle) {
    match hub.close(&handle.id).await {
        Ok(()) | Err(HubError::ConnectionNotFound(_)) => {}
        // Logged by close(); the entry stays registered
        Err(HubError::Close { .. }) => {
            tracing::warn!(connection_id = %handle.id, "Dead connection left attached");
        }
        Err(e) => tracing::debug!(connection_id = %handle.id, error = %e, "Unexpected close error"),
    }
    tracing::debug!(connection_id = %handle.id, "Receive loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ProcessorError, ERROR_TYPE};
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_unknown_type() {
        let hub = Hub::default();
        let response = hub.dispatch(Envelope::new("notamethod", json!(null))).await;

        assert_eq!(response.kind, ERROR_TYPE);
        assert_eq!(response.payload, json!(UNKNOWN_MESSAGE_TYPE));
        assert!(response.time.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_processor_failure() {
        let hub = Hub::default();
        hub.register_fn("fail", |_hub, _request: Envelope| async move {
            Err::<Envelope, _>(ProcessorError::new("forced error"))
        })
        .unwrap();

        let response = hub.dispatch(Envelope::new("fail", json!(null))).await;
        assert_eq!(response.kind, ERROR_TYPE);
        assert_eq!(response.payload, json!("forced error"));
    }

    #[tokio::test]
    async fn test_dispatch_passes_hub_to_processor() {
        let hub = Hub::default();
        hub.register_fn("count", |hub: Hub, _request: Envelope| async move {
            Ok::<_, ProcessorError>(Envelope::new("count", hub.processor_types().len()))
        })
        .unwrap();

        let response = hub.dispatch(Envelope::new("count", json!(null))).await;
        assert_eq!(response.payload, json!(1));
    }
}
