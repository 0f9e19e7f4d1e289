//! Document store abstraction
//!
//! The migration only needs five operations from the database. They sit
//! behind [`DocumentStore`] so the phases can run against MongoDB in
//! production and against [`MemoryStore`] in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ID_FIELD;
use crate::error::{MigrateError, duplicate_key_index};

/// How migrated documents are written to their destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Unconditional insert. A rerun fails on the first `_id` already present.
    #[default]
    Insert,
    /// Replace the document with the same `_id`, inserting it if absent.
    Upsert,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Insert => write!(f, "insert"),
            WriteMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Minimal document database interface
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read every document in a collection (no filter, no projection)
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, MigrateError>;

    /// Insert a single document
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), MigrateError>;

    /// Ordered bulk insert. Stops at the first failing document.
    ///
    /// Returns the number of documents inserted.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, MigrateError>;

    /// Replace the document sharing `document`'s `_id`, inserting it if absent
    async fn upsert_by_id(&self, collection: &str, document: Document) -> Result<(), MigrateError>;

    /// Number of documents in a collection
    async fn count(&self, collection: &str) -> Result<u64, MigrateError>;
}

/// Write one document according to `mode`
pub async fn write_document(
    store: &dyn DocumentStore,
    mode: WriteMode,
    collection: &str,
    document: Document,
) -> Result<(), MigrateError> {
    match mode {
        WriteMode::Insert => store.insert_one(collection, document).await,
        WriteMode::Upsert => store.upsert_by_id(collection, document).await,
    }
}

fn id_of(collection: &str, document: &Document) -> Result<Bson, MigrateError> {
    document.get(ID_FIELD).cloned().ok_or_else(|| MigrateError::MissingId {
        collection: collection.to_string(),
    })
}

fn describe_id(id: Option<&Bson>) -> String {
    id.map(ToString::to_string).unwrap_or_else(|| "<generated>".to_string())
}

/// MongoDB-backed store over a single database handle
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and verify the server answers a ping
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, MigrateError> {
        debug!(%uri, %db_name, "MongoStore::connect: called");
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 }).await?;
        info!(database = %db_name, "Connected to MongoDB");
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    fn map_write_error(err: mongodb::error::Error, collection: &str, ids: &[Option<Bson>]) -> MigrateError {
        match duplicate_key_index(&err) {
            Some(index) => MigrateError::DuplicateKey {
                collection: collection.to_string(),
                id: describe_id(ids.get(index).and_then(Option::as_ref)),
            },
            None => MigrateError::Database(err),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, MigrateError> {
        debug!(%collection, "MongoStore::find_all: called");
        let cursor = self.collection(collection).find(doc! {}).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), MigrateError> {
        let id = document.get(ID_FIELD).cloned();
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| Self::map_write_error(e, collection, &[id]))?;
        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, MigrateError> {
        debug!(%collection, count = documents.len(), "MongoStore::insert_many: called");
        let ids: Vec<Option<Bson>> = documents.iter().map(|d| d.get(ID_FIELD).cloned()).collect();
        let result = self
            .collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| Self::map_write_error(e, collection, &ids))?;
        Ok(result.inserted_ids.len())
    }

    async fn upsert_by_id(&self, collection: &str, document: Document) -> Result<(), MigrateError> {
        let id = id_of(collection, &document)?;
        self.collection(collection)
            .replace_one(doc! { ID_FIELD: id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64, MigrateError> {
        Ok(self.collection(collection).count_documents(doc! {}).await?)
    }
}

/// In-memory store with MongoDB's `_id` uniqueness rules
///
/// Documents inserted without `_id` get a fresh ObjectId, like the driver
/// assigns before sending them to the server.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, replacing whatever it held
    pub fn with_collection(self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), documents);
        self
    }

    /// Snapshot of a collection's documents in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn insert_locked(
        collections: &mut HashMap<String, Vec<Document>>,
        collection: &str,
        mut document: Document,
    ) -> Result<(), MigrateError> {
        let docs = collections.entry(collection.to_string()).or_default();
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(MigrateError::DuplicateKey {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.push(document);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, MigrateError> {
        Ok(self.documents(collection))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), MigrateError> {
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        Self::insert_locked(&mut collections, collection, document)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, MigrateError> {
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        let mut inserted = 0;
        for document in documents {
            Self::insert_locked(&mut collections, collection, document)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn upsert_by_id(&self, collection: &str, document: Document) -> Result<(), MigrateError> {
        let id = id_of(collection, &document)?;
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.get(ID_FIELD) == Some(&id)) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64, MigrateError> {
        Ok(self.documents(collection).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongo_duplicate_key_names_document() {
        let ids = [Some(Bson::String("s1".to_string()))];

        let err = MongoStore::map_write_error(crate::error::tests::write_error(11000), "sites", &ids);

        match err {
            MigrateError::DuplicateKey { collection, id } => {
                assert_eq!(collection, "sites");
                assert!(id.contains("s1"));
            }
            other => panic!("expected DuplicateKey, got {:?}", other),
        }
    }

    #[test]
    fn test_mongo_other_write_error_passes_through() {
        let err = MongoStore::map_write_error(crate::error::tests::write_error(121), "sites", &[None]);
        assert!(matches!(err, MigrateError::Database(_)));
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_id() {
        let store = MemoryStore::new();
        store.insert_one("sites", doc! { "_id": "a", "name": "first" }).await.unwrap();

        let err = store
            .insert_one("sites", doc! { "_id": "a", "name": "second" })
            .await
            .unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.count("sites").await.unwrap(), 1);
        assert_eq!(store.documents("sites")[0].get_str("name").unwrap(), "first");
    }

    #[tokio::test]
    async fn test_memory_store_assigns_missing_id() {
        let store = MemoryStore::new();
        store.insert_one("sites", doc! { "name": "no id" }).await.unwrap();

        let docs = store.documents("sites");
        assert!(docs[0].get_object_id(ID_FIELD).is_ok());
    }

    #[tokio::test]
    async fn test_insert_many_is_ordered() {
        let store = MemoryStore::new();
        let docs = vec![doc! { "_id": 1 }, doc! { "_id": 2 }, doc! { "_id": 1 }, doc! { "_id": 3 }];

        let err = store.insert_many("nodes", docs).await.unwrap_err();

        assert!(err.is_duplicate_key());
        let ids: Vec<i32> = store
            .documents("nodes")
            .iter()
            .map(|d| d.get_i32(ID_FIELD).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryStore::new();
        write_document(&store, WriteMode::Upsert, "nodes", doc! { "_id": 1, "v": "old" })
            .await
            .unwrap();
        write_document(&store, WriteMode::Upsert, "nodes", doc! { "_id": 1, "v": "new" })
            .await
            .unwrap();

        let docs = store.documents("nodes");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("v").unwrap(), "new");
    }

    #[tokio::test]
    async fn test_upsert_requires_id() {
        let store = MemoryStore::new();
        let err = store.upsert_by_id("nodes", doc! { "v": 1 }).await.unwrap_err();
        assert!(matches!(err, MigrateError::MissingId { .. }));
    }

    #[test]
    fn test_write_mode_serde() {
        let mode: WriteMode = serde_yaml::from_str("upsert").unwrap();
        assert_eq!(mode, WriteMode::Upsert);
        assert_eq!(WriteMode::default(), WriteMode::Insert);
        assert_eq!(WriteMode::Insert.to_string(), "insert");
    }
}
