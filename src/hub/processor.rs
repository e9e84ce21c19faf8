//! Processor Table
//!
//! Maps a message type to the processor that answers it. Registration is
//! one-shot: a type can be bound once for the lifetime of the hub.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::envelope::Envelope;
use super::error::{HubError, ProcessorError};
use super::Hub;

/// Handles inbound envelopes of one message type
#[async_trait]
pub trait Processor: Send + Sync {
    /// Produce the response for `request`
    ///
    /// An `Err` is turned into an `"error"` envelope carrying its message.
    async fn process(&self, hub: &Hub, request: Envelope) -> Result<Envelope, ProcessorError>;
}

/// Adapter that lets an async closure act as a [`Processor`]
pub struct FnProcessor<F>(F);

impl<F> FnProcessor<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Hub, Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Envelope, ProcessorError>> + Send + 'static,
{
    async fn process(&self, hub: &Hub, request: Envelope) -> Result<Envelope, ProcessorError> {
        (self.0)(hub.clone(), request).await
    }
}

/// Registered processors, keyed by message type
///
/// Read-mostly after startup; the lock is never held across an `.await`.
#[derive(Default)]
pub struct ProcessorTable {
    processors: RwLock<HashMap<String, Arc<dyn Processor>>>,
}

impl ProcessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `kind` to `processor`
    ///
    /// Fails without touching the table if `kind` is already bound.
    pub fn register(
        &self,
        kind: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Result<(), HubError> {
        let kind = kind.into();
        let mut processors = self.write();

        if processors.contains_key(&kind) {
            return Err(HubError::AlreadyRegistered(kind));
        }

        tracing::debug!(message_type = %kind, "Registered processor");
        processors.insert(kind, processor);
        Ok(())
    }

    /// Find the processor bound to `kind`
    pub fn lookup(&self, kind: &str) -> Option<Arc<dyn Processor>> {
        self.read().get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.read().contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered message types, sorted
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    // A panic while holding the lock can't leave the map half-updated, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Processor>>> {
        self.processors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Processor>>> {
        self.processors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
