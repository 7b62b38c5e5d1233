//! DOI model
//!
//! Identifier, lifecycle status and the status record the registry keeps
//! for every DOI it has minted.

mod message;

pub use message::ChangeDoiMessage;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefixes that may precede a DOI name in user or message input
const RESOLVER_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// A normalized DOI name such as `10.15468/dl.abc123`.
///
/// DOI names are case-insensitive, so the value is stored lowercased and
/// equality is plain string equality on the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Doi(String);

/// Reasons a string is not a DOI
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DoiParseError {
    #[error("DOI is empty")]
    Empty,

    #[error("DOI must start with the 10. directory indicator: {0}")]
    MissingDirectory(String),

    #[error("DOI has no prefix/suffix separator: {0}")]
    MissingSeparator(String),

    #[error("DOI suffix is empty: {0}")]
    EmptySuffix(String),
}

impl Doi {
    /// Parse and normalize a DOI, accepting resolver URLs and `doi:` prefixes
    pub fn parse(input: &str) -> Result<Self, DoiParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DoiParseError::Empty);
        }

        let lower = trimmed.to_lowercase();
        let name = RESOLVER_PREFIXES
            .iter()
            .find_map(|p| lower.strip_prefix(*p))
            .unwrap_or(&lower);

        if !name.starts_with("10.") {
            return Err(DoiParseError::MissingDirectory(trimmed.to_string()));
        }
        let Some((_, suffix)) = name.split_once('/') else {
            return Err(DoiParseError::MissingSeparator(trimmed.to_string()));
        };
        if suffix.is_empty() {
            return Err(DoiParseError::EmptySuffix(trimmed.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Registrant prefix, e.g. `10.15468`
    pub fn prefix(&self) -> &str {
        self.0.split_once('/').map(|(p, _)| p).unwrap_or(&self.0)
    }

    /// Suffix assigned by the registrant, e.g. `dl.abc123`
    pub fn suffix(&self) -> &str {
        self.0.split_once('/').map(|(_, s)| s).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Doi {
    type Err = DoiParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Doi {
    type Error = DoiParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Doi> for String {
    fn from(doi: Doi) -> Self {
        doi.0
    }
}

/// Lifecycle status of a DOI as the registry believes the authority has it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoiStatus {
    /// Created locally, never sent to the authority
    #[default]
    New,
    /// Placeholder registration, not yet resolvable
    Reserved,
    /// Resolvable, the authority holds target and metadata
    Registered,
    /// Withdrawn, the authority keeps a tombstone
    Deleted,
    /// Last attempted transition did not complete against the authority
    Failed,
}

impl fmt::Display for DoiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Reserved => "RESERVED",
            Self::Registered => "REGISTERED",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Kind of registry entity a DOI was minted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoiType {
    DataPackage,
    #[default]
    Download,
    Dataset,
}

/// Status and target pair, as written by the worker and reported by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoiData {
    pub status: DoiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl DoiData {
    pub fn new(status: DoiStatus, target: Option<String>) -> Self {
        Self { status, target }
    }
}

/// Everything the store keeps for one DOI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub doi_type: DoiType,
    pub status: DoiStatus,
    pub target: Option<String>,
    /// Last submitted metadata document
    pub metadata: Option<String>,
}

impl StatusRecord {
    /// Freshly created record, unknown to the authority
    pub fn new(doi_type: DoiType) -> Self {
        Self {
            doi_type,
            status: DoiStatus::New,
            target: None,
            metadata: None,
        }
    }

    pub fn data(&self) -> DoiData {
        DoiData::new(self.status, self.target.clone())
    }
}
