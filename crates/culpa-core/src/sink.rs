use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorResult;

/// Records sampled from one collection, addressed to its watchpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleBatch {
    pub watchpoint: String,
    pub database: String,
    pub collection: String,
    pub sampled_at: DateTime<Utc>,
    pub records: Vec<serde_json::Value>,
}

/// Acknowledgement for a committed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub queue_id: String,
    pub record_count: u64,
    #[serde(default)]
    pub server_result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Downstream monitoring service.
#[async_trait]
pub trait WatchpointSink: Send + Sync {
    /// Check the service is reachable and accepts our credentials.
    async fn ping(&self) -> ConnectorResult<ControllerStatus>;

    async fn submit(&self, batch: SampleBatch) -> ConnectorResult<CommitReceipt>;
}
