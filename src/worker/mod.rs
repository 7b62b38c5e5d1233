//! Worker module - DOI change processing
//!
//! - [`reconciler`]: applies one change message against authority and store
//! - [`processor`]: JetStream consumer feeding the reconciler

pub mod attempt;
pub mod backoff;
pub mod lease;
pub mod processor;
pub mod reconciler;

pub use attempt::{AttemptState, FailureKind, Recovery, MAX_ATTEMPTS};
pub use backoff::{Backoff, Paused};
pub use lease::{DoiLease, DoiLocks};
pub use processor::{Worker, WorkerConfig, CONSUMER_NAME, STREAM_NAME, SUBJECT_PREFIX};
pub use reconciler::{DoiReconciler, Outcome};
