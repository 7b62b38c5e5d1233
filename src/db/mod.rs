//! Identifier store
//!
//! Durable mapping from DOI to the status record the registry believes the
//! authority holds. MongoDB in production, in-memory for tests and dev mode.

pub mod memory;
pub mod mongo;
pub mod schemas;

pub use memory::InMemoryDoiStore;
pub use mongo::{MongoClient, MongoCollection, MongoDoiStore, STORE_TIMEOUT};

use async_trait::async_trait;

use crate::doi::{Doi, DoiData, DoiType, StatusRecord};
use crate::types::Result;

/// Persistent DOI status table.
#[async_trait]
pub trait DoiStore: Send + Sync {
    /// Current record, `None` if the DOI was never created here
    async fn get(&self, doi: &Doi) -> Result<Option<StatusRecord>>;

    /// Create a `NEW` record; fails if the DOI already exists
    async fn create(&self, doi: &Doi, doi_type: DoiType) -> Result<()>;

    /// Overwrite status and target. `None` metadata clears the stored document.
    async fn update(&self, doi: &Doi, data: &DoiData, metadata: Option<&str>) -> Result<()>;

    /// Remove the record; removing an absent DOI is not an error
    async fn delete(&self, doi: &Doi) -> Result<()>;
}
