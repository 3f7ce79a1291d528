use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConnectorResult;

/// A collection found in the target database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Estimated, not exact.
    pub document_count: u64,
}

/// Read-only view of the database being monitored.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    fn database_name(&self) -> &str;

    /// List user collections (`system.*` excluded).
    async fn list_collections(&self) -> ConnectorResult<Vec<CollectionInfo>>;

    /// Fetch up to `limit` records, newest first.
    async fn sample(&self, collection: &str, limit: u32) -> ConnectorResult<Vec<serde_json::Value>>;
}
