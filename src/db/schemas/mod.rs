//! Database schemas
//!
//! Defines MongoDB document structures for DOI status records.

mod doi;
mod metadata;

pub use doi::{DoiDoc, DOI_COLLECTION};
pub use metadata::Metadata;
