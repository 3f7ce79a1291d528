//! JSON bodies exchanged with the Data Culpa controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_PATH: &str = "/api/status";
pub const ENQUEUE_PATH: &str = "/api/queue/enqueue";
pub const COMMIT_PATH: &str = "/api/queue/commit";

#[derive(Debug, Clone, Serialize)]
pub struct BatchMetadata<'a> {
    pub source: &'static str,
    pub database: &'a str,
    pub collection: &'a str,
    pub sampled_at: DateTime<Utc>,
}

/// One chunk of records for a watchpoint queue. The first chunk opens the
/// queue; later chunks carry the `queue_id` it returned.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueRequest<'a> {
    pub watchpoint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<&'a str>,
    pub records: &'a [serde_json::Value],
    pub metadata: BatchMetadata<'a>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueResponse {
    pub queue_id: String,
    #[serde(default)]
    pub queued: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitRequest<'a> {
    pub watchpoint: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitResponse {
    pub queue_id: String,
    pub record_count: u64,
    #[serde(default)]
    pub result: serde_json::Value,
}
