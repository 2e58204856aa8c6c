//! MongoDB backend

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{Document, DocumentStore, Filter, FindOptions, StoreError};
use crate::config::DbConfig;
use crate::connection::Connector;

/// Server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => Self::Connection(err.to_string()),
            ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY_CODE => {
                Self::DuplicateKey(we.message.clone())
            }
            ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
                Self::Serialization(err.to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// Store backed by one MongoDB database
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db_name: &str) -> Self {
        Self {
            db: client.database(db_name),
        }
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

fn to_bson_document(doc: Document) -> Result<bson::Document, StoreError> {
    bson::to_document(&Value::Object(doc)).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_bson_document(mut doc: bson::Document) -> Result<Document, StoreError> {
    doc.remove("_id");
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected a document, got {other}"
        ))),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    #[instrument(skip(self, doc), level = "debug")]
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        self.collection(collection)
            .insert_one(to_bson_document(doc)?)
            .await?;
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one(filter.to_bson()?)
            .await?
            .map(from_bson_document)
            .transpose()
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut find_options = mongodb::options::FindOptions::default();
        find_options.skip = Some(options.skip);
        find_options.limit = options.limit;
        find_options.sort = options.sort.as_ref().map(|s| s.to_bson());

        let docs: Vec<bson::Document> = self
            .collection(collection)
            .find(filter.to_bson()?)
            .with_options(find_options)
            .await?
            .try_collect()
            .await?;
        debug!(collection, count = docs.len(), "find");
        docs.into_iter().map(from_bson_document).collect()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self
            .collection(collection)
            .count_documents(filter.to_bson()?)
            .await?)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<u64, StoreError> {
        let update = doc! { "$set": to_bson_document(set)? };
        let result = self
            .collection(collection)
            .update_one(filter.to_bson()?, update)
            .await?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(filter.to_bson()?)
            .await?;
        Ok(result.deleted_count)
    }

    async fn ensure_unique_index(
        &self,
        collection: &str,
        fields: &[&str],
    ) -> Result<(), StoreError> {
        let mut keys = bson::Document::new();
        for field in fields {
            keys.insert(*field, 1);
        }
        let name = format!("{}_unique", fields.join("_"));
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).name(name).build())
            .build();
        self.collection(collection).create_index(index).await?;
        Ok(())
    }
}

/// Opens [`MongoStore`] handles for the connection manager
pub struct MongoConnector {
    uri: String,
    redacted: String,
    db_name: String,
    timeout: Duration,
}

impl MongoConnector {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            redacted: config.redacted_uri(),
            db_name: config.db_name.clone(),
            timeout: config.op_timeout,
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);
        options.app_name = Some("geoctl".to_string());

        let client = Client::with_options(options)?;
        let store = MongoStore::new(client, &self.db_name);
        // Client construction is lazy; ping forces server selection
        store.ping().await?;
        debug!(uri = %self.redacted, db = %self.db_name, "mongo client ready");
        Ok(Arc::new(store))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.redacted, self.db_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bson_roundtrip_drops_object_id() {
        let mut raw = doc! { "code": "US", "population": 331_000_000_i64, "area_km2": 9.8e6 };
        raw.insert("_id", bson::oid::ObjectId::new());
        let doc = from_bson_document(raw).unwrap();
        assert_eq!(
            Value::Object(doc),
            json!({"code": "US", "population": 331_000_000_i64, "area_km2": 9.8e6})
        );
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn connects_to_local_mongo() {
        let connector = MongoConnector::new(&DbConfig::default());
        let store = connector.connect().await.unwrap();
        store.ping().await.unwrap();
    }
}
