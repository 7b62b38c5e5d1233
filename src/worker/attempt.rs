//! Retry loop state and failure classification

use std::fmt;

use crate::authority::DoiError;
use crate::doi::ChangeDoiMessage;
use crate::metadata::MetadataError;
use crate::types::UpdaterError;

/// Total tries per message, including the first
pub const MAX_ATTEMPTS: u32 = 3;

/// One iteration of the retry loop: the message as it will be sent and
/// which attempt this is (1-based). Advancing yields a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    message: ChangeDoiMessage,
    attempt: u32,
}

impl AttemptState {
    pub fn first(message: ChangeDoiMessage) -> Self {
        Self { message, attempt: 1 }
    }

    pub fn message(&self) -> &ChangeDoiMessage {
        &self.message
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_last(&self) -> bool {
        self.attempt >= MAX_ATTEMPTS
    }

    /// Next attempt with the same message, `None` once attempts are used up
    pub fn next(&self) -> Option<Self> {
        (!self.is_last()).then(|| Self {
            message: self.message.clone(),
            attempt: self.attempt + 1,
        })
    }

    /// Next attempt carrying replacement metadata
    pub fn next_with_metadata(&self, metadata: String) -> Option<Self> {
        (!self.is_last()).then(|| Self {
            message: self.message.with_metadata(metadata),
            attempt: self.attempt + 1,
        })
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// DOI already exists remotely
    Conflict,
    /// Authority refused the metadata as too large (HTTP 413)
    PayloadTooLarge,
    /// Any other non-success HTTP status
    Http(u16),
    /// Transport failure, local store failure or anything unclassified
    Generic(String),
    /// Metadata rejected before anything was sent
    InvalidMetadata(String),
}

/// What the retry loop does about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Benign race, stop retrying
    Stop,
    /// Nothing reached the authority, give up without touching the store
    Reject,
    /// Shorten the metadata and retry straight away
    Truncate,
    /// Pause, then retry unchanged
    Backoff,
}

impl FailureKind {
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Conflict => Recovery::Stop,
            Self::InvalidMetadata(_) => Recovery::Reject,
            Self::PayloadTooLarge => Recovery::Truncate,
            Self::Http(_) | Self::Generic(_) => Recovery::Backoff,
        }
    }
}

impl Recovery {
    /// Whether the store must show FAILED before the loop moves on
    pub fn marks_failed(&self) -> bool {
        !matches!(self, Self::Reject)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "DOI already exists"),
            Self::PayloadTooLarge => write!(f, "metadata too large (HTTP 413)"),
            Self::Http(status) => write!(f, "HTTP {}", status),
            Self::Generic(msg) => write!(f, "{}", msg),
            Self::InvalidMetadata(msg) => write!(f, "invalid metadata: {}", msg),
        }
    }
}

impl From<DoiError> for FailureKind {
    fn from(err: DoiError) -> Self {
        match err {
            DoiError::Exists(_) => Self::Conflict,
            DoiError::Http { status, .. } if status == DoiError::PAYLOAD_TOO_LARGE => {
                Self::PayloadTooLarge
            }
            DoiError::Http { status, .. } => Self::Http(status),
            DoiError::Service(msg) => Self::Generic(msg),
            DoiError::InvalidMetadata(msg) => Self::InvalidMetadata(msg),
        }
    }
}

impl From<MetadataError> for FailureKind {
    fn from(err: MetadataError) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<UpdaterError> for FailureKind {
    fn from(err: UpdaterError) -> Self {
        Self::Generic(err.to_string())
    }
}
