//! MongoDB client, collection wrapper and the Mongo-backed DOI store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::schemas::{DoiDoc, Metadata, DOI_COLLECTION};
use super::DoiStore;
use crate::doi::{Doi, DoiData, DoiType, StatusRecord};
use crate::types::{Result, UpdaterError};

/// Upper bound for server selection and connect on every store call
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_ms = STORE_TIMEOUT.as_millis();
        let separator = if uri.contains('?') { '&' } else { '?' };
        let timeout_uri = format!(
            "{}{}serverSelectionTimeoutMS={}&connectTimeoutMS={}",
            uri, separator, timeout_ms, timeout_ms
        );

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| UpdaterError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| UpdaterError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| UpdaterError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| UpdaterError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| UpdaterError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| UpdaterError::Database(format!("Find failed: {}", e)))
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| UpdaterError::Database(format!("Update failed: {}", e)))
    }

    /// Remove one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| UpdaterError::Database(format!("Delete failed: {}", e)))
    }
}

/// [`DoiStore`] backed by the `dois` collection
#[derive(Clone)]
pub struct MongoDoiStore {
    collection: MongoCollection<DoiDoc>,
}

impl MongoDoiStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<DoiDoc>(DOI_COLLECTION).await?;
        info!(
            "DOI store using collection '{}.{}'",
            client.db_name(),
            DOI_COLLECTION
        );
        Ok(Self { collection })
    }

    fn filter(doi: &Doi) -> Document {
        doc! { "doi": doi.as_str() }
    }
}

#[async_trait]
impl DoiStore for MongoDoiStore {
    async fn get(&self, doi: &Doi) -> Result<Option<StatusRecord>> {
        let found = self.collection.find_one(Self::filter(doi)).await?;
        Ok(found.map(DoiDoc::into_record))
    }

    async fn create(&self, doi: &Doi, doi_type: DoiType) -> Result<()> {
        let id = self.collection.insert_one(DoiDoc::new(doi, doi_type)).await?;
        debug!("Created DOI {} as {:?} ({})", doi, doi_type, id);
        Ok(())
    }

    async fn update(&self, doi: &Doi, data: &DoiData, metadata: Option<&str>) -> Result<()> {
        let update = doc! {
            "$set": {
                "status": bson::to_bson(&data.status)?,
                "target": data.target.clone(),
                "xml": metadata.map(str::to_string),
                "metadata.updated_at": DateTime::now(),
            }
        };

        let result = self.collection.update_one(Self::filter(doi), update).await?;
        if result.matched_count == 0 {
            return Err(UpdaterError::NotFound(format!("DOI {}", doi)));
        }
        Ok(())
    }

    async fn delete(&self, doi: &Doi) -> Result<()> {
        let result = self.collection.delete_one(Self::filter(doi)).await?;
        debug!("Deleted {} record(s) for DOI {}", result.deleted_count, doi);
        Ok(())
    }
}
