//! Inbound "change DOI status" message

use serde::{Deserialize, Serialize};

use super::{Doi, DoiStatus};

/// Request to move a DOI to a new status at the registration authority.
///
/// Delivered at-least-once. The worker may swap in truncated metadata for a
/// retry, which always produces a new value through [`ChangeDoiMessage::with_metadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDoiMessage {
    /// Desired status
    pub status: DoiStatus,
    pub doi: Doi,
    /// DataCite metadata document (XML)
    #[serde(default)]
    pub metadata: String,
    /// URL the DOI should resolve to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ChangeDoiMessage {
    pub fn new(
        status: DoiStatus,
        doi: Doi,
        metadata: impl Into<String>,
        target: Option<String>,
    ) -> Self {
        Self {
            status,
            doi,
            metadata: metadata.into(),
            target,
        }
    }

    /// Copy of this message carrying a different metadata document
    pub fn with_metadata(&self, metadata: String) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }
}
