//! Registration authority
//!
//! The authority (DataCite) issues DOIs and resolves them to a target URL
//! with associated metadata. [`DoiService`] is the only seam through which
//! the worker performs network I/O.

mod datacite;

pub use datacite::{DataCiteClient, DataCiteConfig};

use async_trait::async_trait;

use crate::doi::{Doi, DoiData};
use crate::metadata::MetadataError;

/// Failures reported by the registration authority
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DoiError {
    /// The DOI already exists remotely where a fresh registration was expected
    #[error("DOI {0} already exists")]
    Exists(Doi),

    /// The remote call completed with a non-success status
    #[error("HTTP {status} from DOI authority: {message}")]
    Http { status: u16, message: String },

    /// Transport level or unclassified failure
    #[error("DOI authority failure: {0}")]
    Service(String),

    /// Metadata rejected before any network call
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl DoiError {
    pub const PAYLOAD_TOO_LARGE: u16 = 413;
    pub const NOT_FOUND: u16 = 404;

    /// HTTP status of the failure, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_payload_too_large(&self) -> bool {
        self.status() == Some(Self::PAYLOAD_TOO_LARGE)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(Self::NOT_FOUND)
    }
}

impl From<MetadataError> for DoiError {
    fn from(err: MetadataError) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<reqwest::Error> for DoiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Service(err.to_string())
    }
}

/// One operation per DOI transition at the registration authority.
#[async_trait]
pub trait DoiService: Send + Sync {
    /// Current status and target as the authority sees it, `None` if unknown
    async fn resolve(&self, doi: &Doi) -> Result<Option<DoiData>, DoiError>;

    /// Reserve the DOI with metadata but without a resolvable target
    async fn reserve(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError>;

    /// First-time registration with target and metadata
    async fn register(&self, doi: &Doi, target: &str, metadata: &str) -> Result<(), DoiError>;

    /// Replace the metadata of a registered DOI
    async fn update_metadata(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError>;

    /// Point a registered DOI at a new target
    async fn update_target(&self, doi: &Doi, target: &str) -> Result<(), DoiError>;

    /// Delete the DOI.
    ///
    /// Returns `true` when the authority removed it completely and `false`
    /// when it keeps a tombstone (registered DOIs are only deactivated).
    async fn delete(&self, doi: &Doi) -> Result<bool, DoiError>;
}
