//! DOI updater - keeps DataCite in step with the registry
//!
//! The registry publishes a change message whenever the desired state of a
//! DOI changes. This crate consumes those messages, performs the matching
//! transition at the registration authority and records the result in the
//! DOI store.
//!
//! ## Components
//!
//! - **doi**: identifiers, statuses and the change message
//! - **metadata**: DataCite kernel validation and description truncation
//! - **authority**: the [`authority::DoiService`] seam and its DataCite client
//! - **db**: the [`db::DoiStore`] seam, MongoDB and in-memory stores
//! - **worker**: retry loop, per-DOI leases and the JetStream consumer

pub mod authority;
pub mod config;
pub mod db;
pub mod doi;
pub mod logging;
pub mod metadata;
pub mod nats;
pub mod types;
pub mod worker;

pub use authority::{DataCiteClient, DataCiteConfig, DoiError, DoiService};
pub use db::{DoiStore, InMemoryDoiStore, MongoDoiStore};
pub use doi::{ChangeDoiMessage, Doi, DoiData, DoiStatus, DoiType, StatusRecord};
pub use metadata::MetadataTruncator;
pub use types::{Result, UpdaterError};
pub use worker::{DoiReconciler, Outcome, Worker, WorkerConfig};
