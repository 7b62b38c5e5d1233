//! In-memory DOI store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::DoiStore;
use crate::doi::{Doi, DoiData, DoiType, StatusRecord};
use crate::types::{Result, UpdaterError};

/// Process-local [`DoiStore`]; contents are lost on restart
#[derive(Debug, Default)]
pub struct InMemoryDoiStore {
    records: DashMap<Doi, StatusRecord>,
}

impl InMemoryDoiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a record directly
    pub fn insert(&self, doi: Doi, record: StatusRecord) {
        self.records.insert(doi, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DoiStore for InMemoryDoiStore {
    async fn get(&self, doi: &Doi) -> Result<Option<StatusRecord>> {
        Ok(self.records.get(doi).map(|r| r.value().clone()))
    }

    async fn create(&self, doi: &Doi, doi_type: DoiType) -> Result<()> {
        match self.records.entry(doi.clone()) {
            Entry::Occupied(_) => Err(UpdaterError::BadRequest(format!(
                "DOI {} already exists",
                doi
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StatusRecord::new(doi_type));
                Ok(())
            }
        }
    }

    async fn update(&self, doi: &Doi, data: &DoiData, metadata: Option<&str>) -> Result<()> {
        let mut record = self
            .records
            .get_mut(doi)
            .ok_or_else(|| UpdaterError::NotFound(format!("DOI {}", doi)))?;
        record.status = data.status;
        record.target = data.target.clone();
        record.metadata = metadata.map(str::to_string);
        Ok(())
    }

    async fn delete(&self, doi: &Doi) -> Result<()> {
        self.records.remove(doi);
        Ok(())
    }
}
