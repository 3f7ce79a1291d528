use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Database};

use culpa_core::collection::is_system_collection;
use culpa_core::error::{ConnectorError, ConnectorResult};
use culpa_core::source::{CollectionInfo, CollectionSource};

use crate::connection::classify;
use crate::record::document_to_json;

/// Read-only access to one MongoDB database.
#[derive(Clone)]
pub struct MongoSource {
    client: Client,
    database: Database,
    name: String,
}

impl MongoSource {
    pub fn new(client: Client, name: &str) -> Self {
        Self {
            database: client.database(name),
            client,
            name: name.to_string(),
        }
    }

    /// Same server and credentials, another database.
    pub fn with_database(&self, name: &str) -> Self {
        Self::new(self.client.clone(), name)
    }
}

#[async_trait]
impl CollectionSource for MongoSource {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> ConnectorResult<Vec<CollectionInfo>> {
        let mut names = self
            .database
            .list_collection_names()
            .await
            .map_err(|e| classify(e, "Failed to list collections"))?;
        names.retain(|n| !is_system_collection(n));
        names.sort();

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            let document_count = self
                .database
                .collection::<Document>(&name)
                .estimated_document_count()
                .await
                .unwrap_or(0);
            infos.push(CollectionInfo {
                name,
                document_count,
            });
        }

        tracing::debug!(database = %self.name, collections = infos.len(), "Listed collections");
        Ok(infos)
    }

    async fn sample(&self, collection: &str, limit: u32) -> ConnectorResult<Vec<serde_json::Value>> {
        let cursor = self
            .database
            .collection::<Document>(collection)
            .find(doc! {})
            .sort(doc! { "_id": -1 })
            .limit(i64::from(limit))
            .await
            .map_err(|e| ConnectorError::collection(collection, e))?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| ConnectorError::collection(collection, e))?;

        tracing::debug!(%collection, records = docs.len(), "Sampled collection");
        Ok(docs.into_iter().map(document_to_json).collect())
    }
}
