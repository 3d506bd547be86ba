//! Delivery of [`FileEvent`]s produced by the reconciler.
//!
//! Publishing never blocks and never fails the promotion: a publisher that
//! cannot deliver an event logs it and drops it.

use attache_core::FileEvent;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Receives one event per promoted or deleted reference.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: FileEvent);
}

/// Forwards events to a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::Sender<FileEvent>,
}

impl ChannelEventPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FileEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<FileEvent>) -> Self {
        Self { tx }
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish(&self, event: FileEvent) {
        if let Err(e) = self.tx.try_send(event) {
            let (reason, event) = match e {
                mpsc::error::TrySendError::Full(event) => ("channel full", event),
                mpsc::error::TrySendError::Closed(event) => ("channel closed", event),
            };
            tracing::warn!(
                reason,
                operation = %event.operation,
                key = %event.key,
                "Dropping file event"
            );
        }
    }
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: FileEvent) {
        tracing::info!(
            event_id = %event.id,
            operation = %event.operation,
            meta_type = %event.meta_type,
            field = %event.field,
            key = %event.key,
            "File event"
        );
    }
}

/// Keeps events in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingEventPublisher {
    events: Mutex<Vec<FileEvent>>,
}

impl CollectingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FileEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<FileEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventPublisher for CollectingEventPublisher {
    fn publish(&self, event: FileEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
