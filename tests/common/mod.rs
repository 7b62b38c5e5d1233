//! Shared fixtures for integration tests
//!
//! A scripted in-process registration authority, a store that is always
//! down and DataCite metadata documents.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use doi_updater::authority::{DoiError, DoiService};
use doi_updater::db::{DoiStore, InMemoryDoiStore};
use doi_updater::doi::{Doi, DoiData, DoiStatus, DoiType, StatusRecord};
use doi_updater::metadata::{validate_metadata_for, MetadataTruncator};
use doi_updater::types::{Result as UpdaterResult, UpdaterError};
use doi_updater::worker::{Backoff, DoiReconciler};

pub const TARGET: &str = "https://www.gbif.org/occurrence/download/0000001-170101000000000";
pub const OTHER_TARGET: &str = "https://www.gbif.org/dataset/7ddf754f-d193-4cc9-b351-99906754a03b";

/// Authority call as observed by the scripted service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(Doi),
    Reserve { doi: Doi, metadata: String },
    Register { doi: Doi, target: String, metadata: String },
    UpdateMetadata { doi: Doi, metadata: String },
    UpdateTarget { doi: Doi, target: String },
    Delete(Doi),
}

/// [`DoiService`] double: validates metadata like the real client, records
/// every call that would reach the network and fails calls from a script.
#[derive(Default)]
pub struct ScriptedDoiService {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<DoiError>>,
    full_delete: bool,
    skip_validation: bool,
}

impl ScriptedDoiService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes report complete removal instead of a tombstone
    pub fn with_full_delete(mut self) -> Self {
        self.full_delete = true;
        self
    }

    /// Accept any metadata, as an authority that only checks size would
    pub fn without_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    /// The next network call fails with `err`
    pub fn fail_next(&self, err: DoiError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// The next `n` network calls fail with `err`
    pub fn fail_times(&self, n: usize, err: DoiError) {
        for _ in 0..n {
            self.fail_next(err.clone());
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn validate(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        if self.skip_validation {
            return Ok(());
        }
        validate_metadata_for(doi, metadata)?;
        Ok(())
    }

    fn record(&self, call: Call) -> Result<(), DoiError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DoiService for ScriptedDoiService {
    async fn resolve(&self, doi: &Doi) -> Result<Option<DoiData>, DoiError> {
        self.record(Call::Resolve(doi.clone()))?;
        Ok(None)
    }

    async fn reserve(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        self.validate(doi, metadata)?;
        self.record(Call::Reserve {
            doi: doi.clone(),
            metadata: metadata.to_string(),
        })
    }

    async fn register(&self, doi: &Doi, target: &str, metadata: &str) -> Result<(), DoiError> {
        self.validate(doi, metadata)?;
        self.record(Call::Register {
            doi: doi.clone(),
            target: target.to_string(),
            metadata: metadata.to_string(),
        })
    }

    async fn update_metadata(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        self.validate(doi, metadata)?;
        self.record(Call::UpdateMetadata {
            doi: doi.clone(),
            metadata: metadata.to_string(),
        })
    }

    async fn update_target(&self, doi: &Doi, target: &str) -> Result<(), DoiError> {
        self.record(Call::UpdateTarget {
            doi: doi.clone(),
            target: target.to_string(),
        })
    }

    async fn delete(&self, doi: &Doi) -> Result<bool, DoiError> {
        self.record(Call::Delete(doi.clone()))?;
        Ok(self.full_delete)
    }
}

/// Store whose backing database is unreachable
pub struct UnavailableStore;

#[async_trait]
impl DoiStore for UnavailableStore {
    async fn get(&self, _doi: &Doi) -> UpdaterResult<Option<StatusRecord>> {
        Err(UpdaterError::Database("connection refused".into()))
    }

    async fn create(&self, _doi: &Doi, _doi_type: DoiType) -> UpdaterResult<()> {
        Err(UpdaterError::Database("connection refused".into()))
    }

    async fn update(&self, _doi: &Doi, _data: &DoiData, _metadata: Option<&str>) -> UpdaterResult<()> {
        Err(UpdaterError::Database("connection refused".into()))
    }

    async fn delete(&self, _doi: &Doi) -> UpdaterResult<()> {
        Err(UpdaterError::Database("connection refused".into()))
    }
}

/// Reconciler wired to the given doubles with a short retry delay
pub struct Harness {
    pub store: Arc<InMemoryDoiStore>,
    pub service: Arc<ScriptedDoiService>,
    pub reconciler: DoiReconciler,
}

impl Harness {
    pub fn new(service: ScriptedDoiService) -> Self {
        Self::with_backoff(service, Backoff::fixed(Duration::from_millis(5)))
    }

    pub fn with_backoff(service: ScriptedDoiService, backoff: Backoff) -> Self {
        let store = Arc::new(InMemoryDoiStore::new());
        let service = Arc::new(service);
        let reconciler = DoiReconciler::new(
            store.clone(),
            service.clone(),
            MetadataTruncator::new(100),
            backoff,
        );
        Self {
            store,
            service,
            reconciler,
        }
    }

    /// Seed the store with a record in `status`
    pub fn seed(&self, doi: &Doi, status: DoiStatus, target: Option<&str>) {
        self.store.insert(
            doi.clone(),
            StatusRecord {
                doi_type: DoiType::Download,
                status,
                target: target.map(str::to_string),
                metadata: None,
            },
        );
    }

    pub async fn record(&self, doi: &Doi) -> Option<StatusRecord> {
        self.store.get(doi).await.unwrap()
    }
}

pub fn doi(suffix: &str) -> Doi {
    Doi::parse(&format!("10.15468/dl.{}", suffix)).unwrap()
}

/// DataCite kernel-4 document for `doi` with the given abstract
pub fn metadata_with_description(doi: &Doi, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<resource xmlns="http://datacite.org/schema/kernel-4">
  <identifier identifierType="DOI">{}</identifier>
  <creators><creator><creatorName>GBIF.org</creatorName></creator></creators>
  <titles><title>Occurrence Download</title></titles>
  <publisher>The Global Biodiversity Information Facility</publisher>
  <publicationYear>2017</publicationYear>
  <descriptions>
    <description xml:lang="en" descriptionType="Abstract">{}</description>
  </descriptions>
</resource>"#,
        doi.as_str().to_uppercase(),
        description
    )
}

pub fn metadata(doi: &Doi) -> String {
    metadata_with_description(doi, "A small occurrence download.")
}

/// Document missing its mandatory creators and publisher
pub fn invalid_metadata(doi: &Doi) -> String {
    format!(
        r#"<resource xmlns="http://datacite.org/schema/kernel-4">
  <identifier identifierType="DOI">{}</identifier>
  <titles><title>Occurrence Download</title></titles>
</resource>"#,
        doi
    )
}

pub fn payload_too_large() -> DoiError {
    DoiError::Http {
        status: 413,
        message: "Request Entity Too Large".into(),
    }
}

pub fn server_error() -> DoiError {
    DoiError::Http {
        status: 500,
        message: "Internal Server Error".into(),
    }
}
