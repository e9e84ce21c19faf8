//! Broadcast Fan-Out
//!
//! The broadcast loop pushes each dequeued envelope into every connection's
//! outbox; a writer task per connection drains its outbox in order.

use std::sync::Weak;
use tokio::sync::mpsc;

use super::connection::ConnectionHandle;
use super::envelope::Envelope;
use super::Hub;

impl Hub {
    /// Deliver one envelope to the current registry snapshot
    pub(crate) async fn fan_out(&self, envelope: Envelope) {
        let recipients = self.snapshot().await;

        for handle in &recipients {
            if !handle.enqueue(envelope.clone()) {
                tracing::debug!(
                    connection_id = %handle.id,
                    "Writer task gone, broadcast dropped"
                );
            }
        }

        tracing::trace!(
            message_type = %envelope.kind,
            recipients = recipients.len(),
            "Broadcast envelope"
        );
    }
}

/// Drain a connection's outbox until the connection is dropped
///
/// Holds only a weak reference so a closed connection's handle can be freed;
/// that drops the outbox sender and ends this task.
pub(crate) async fn write_outbox(
    handle: Weak<ConnectionHandle>,
    mut outbox: mpsc::UnboundedReceiver<Envelope>,
    warn_threshold: u32,
) {
    while let Some(envelope) = outbox.recv().await {
        let Some(handle) = handle.upgrade() else {
            break;
        };

        match handle.send(&envelope).await {
            Ok(()) => handle.record_success(),
            Err(e) => {
                let failures = handle.record_failure();
                if failures >= warn_threshold {
                    tracing::error!(
                        connection_id = %handle.id,
                        consecutive_failures = failures,
                        error = %e,
                        "Connection keeps failing broadcasts but is still attached"
                    );
                } else {
                    tracing::warn!(
                        connection_id = %handle.id,
                        error = %e,
                        "Broadcast send failed"
                    );
                }
            }
        }
    }
}
