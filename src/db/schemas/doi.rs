//! DOI status document schema
//!
//! One document per DOI minted by the registry.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::doi::{Doi, DoiStatus, DoiType, StatusRecord};

/// Collection name for DOI status records
pub const DOI_COLLECTION: &str = "dois";

/// DOI status document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DoiDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Normalized DOI name
    pub doi: String,

    pub doi_type: DoiType,

    pub status: DoiStatus,

    /// URL the DOI resolves to
    #[serde(default)]
    pub target: Option<String>,

    /// Last submitted DataCite XML
    #[serde(default)]
    pub xml: Option<String>,
}

impl DoiDoc {
    /// Create a new DOI document in `NEW` status
    pub fn new(doi: &Doi, doi_type: DoiType) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            doi: doi.as_str().to_string(),
            doi_type,
            status: DoiStatus::New,
            target: None,
            xml: None,
        }
    }

    pub fn into_record(self) -> StatusRecord {
        StatusRecord {
            doi_type: self.doi_type,
            status: self.status,
            target: self.target,
            metadata: self.xml,
        }
    }
}

impl IntoIndexes for DoiDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the DOI name
            (
                doc! { "doi": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("doi_unique".to_string())
                        .build(),
                ),
            ),
            // Index on status for out-of-band reconciliation of FAILED records
            (
                doc! { "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DoiDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
