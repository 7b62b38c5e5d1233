//! DataCite metadata documents
//!
//! The worker treats metadata as opaque XML except for two operations:
//! structural validation before anything is sent to the authority, and
//! truncation of oversized descriptions when the authority refuses a
//! document as too large.

mod truncate;
mod validate;

pub use truncate::MetadataTruncator;
pub use validate::{validate_metadata, validate_metadata_for};

/// Local element name of the DataCite document root
pub const ROOT_ELEMENT: &str = "resource";

/// Errors raised while reading a metadata document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Not well-formed XML
    #[error("Malformed metadata XML: {0}")]
    Malformed(String),

    /// Well-formed, but not a usable DataCite document
    #[error("Invalid metadata: {0}")]
    Invalid(String),
}

/// Lossy UTF-8 local name of an element or attribute
fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
