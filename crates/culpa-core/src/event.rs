use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        run_id: Uuid,
        database: String,
        at: DateTime<Utc>,
    },
    CollectionSkipped {
        run_id: Uuid,
        collection: String,
        reason: String,
    },
    CollectionSampled {
        run_id: Uuid,
        collection: String,
        records: usize,
    },
    CollectionSubmitted {
        run_id: Uuid,
        collection: String,
        watchpoint: String,
        queue_id: String,
        records: u64,
    },
    CollectionFailed {
        run_id: Uuid,
        collection: String,
        error: String,
    },
    MissingCollection {
        run_id: Uuid,
        collection: String,
    },
    Completed {
        run_id: Uuid,
        at: DateTime<Utc>,
    },
}

/// Sink for scan events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ScanEvent);
}

/// Channel-based event sink that forwards events to a receiver.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }
}

/// Logs every event through `tracing`.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: ScanEvent) {
        match &event {
            ScanEvent::CollectionFailed {
                collection, error, ..
            } => {
                tracing::error!(%collection, %error, "Collection scan failed");
            }
            ScanEvent::MissingCollection { collection, .. } => {
                tracing::warn!(%collection, "Configured collection not found in database");
            }
            ScanEvent::CollectionSkipped {
                collection, reason, ..
            } => {
                tracing::info!(%collection, %reason, "Skipping collection");
            }
            _ => tracing::info!(?event, "scan_event"),
        }
    }
}
