//! DOI reconciliation
//!
//! Takes one change message, drives the registration authority through the
//! matching transition and records the outcome in the DOI store.
//!
//! ```text
//! message ─► lease(doi) ─► store.get ─┬─ absent ──────────► drop (warn)
//!                                     └─ record ─► dispatch ─┬─ ok ──► store.update / delete
//!                                                            └─ err ─► store FAILED, classify:
//!                                                                       conflict  ─► stop
//!                                                                       too large ─► truncate, retry
//!                                                                       other     ─► pause, retry
//! ```
//!
//! Nothing is ever returned as an error: delivery is at-least-once and has
//! no reply channel, so every branch ends in a store write or a log line.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::attempt::{AttemptState, FailureKind, Recovery, MAX_ATTEMPTS};
use super::backoff::Backoff;
use super::lease::DoiLocks;
use crate::authority::DoiService;
use crate::db::DoiStore;
use crate::doi::{ChangeDoiMessage, DoiData, DoiStatus, StatusRecord};
use crate::logging::DOI_ALERT;
use crate::metadata::{validate_metadata_for, MetadataTruncator};

/// How handling a message ended. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No store record for the DOI, message dropped
    UnknownDoi,
    /// Requested status is not a legal target
    IllegalStatus,
    /// Authority and store both reflect the requested status
    Applied,
    /// DOI already existed at the authority
    Conflict,
    /// Metadata failed validation before anything was sent
    Rejected,
    /// All attempts failed, store shows FAILED
    Exhausted,
    /// The store could not be read, nothing was attempted
    StoreUnavailable,
}

/// Result of a single dispatch
enum Dispatched {
    Applied,
    Ignored,
}

/// Applies DOI change messages against the authority and the store
pub struct DoiReconciler {
    store: Arc<dyn DoiStore>,
    service: Arc<dyn DoiService>,
    truncator: MetadataTruncator,
    backoff: Backoff,
    locks: DoiLocks,
}

impl DoiReconciler {
    pub fn new(
        store: Arc<dyn DoiStore>,
        service: Arc<dyn DoiService>,
        truncator: MetadataTruncator,
        backoff: Backoff,
    ) -> Self {
        Self {
            store,
            service,
            truncator,
            backoff,
            locks: DoiLocks::new(),
        }
    }

    /// Handle one change message to completion
    pub async fn handle(&self, msg: ChangeDoiMessage) -> Outcome {
        debug!("Handling change DOI to {} message for {}", msg.status, msg.doi);
        let _lease = self.locks.acquire(&msg.doi).await;

        let current = match self.store.get(&msg.doi).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                // every DOI we mint is created in the store first
                warn!("Skipping unknown DOI {}", msg.doi);
                return Outcome::UnknownDoi;
            }
            Err(e) => {
                error!("Cannot load status of DOI {}: {}", msg.doi, e);
                return Outcome::StoreUnavailable;
            }
        };

        let mut state = AttemptState::first(msg);
        loop {
            let failure = match self.dispatch(state.message(), &current).await {
                Ok(Dispatched::Applied) => return Outcome::Applied,
                Ok(Dispatched::Ignored) => return Outcome::IllegalStatus,
                Err(failure) => failure,
            };

            let recovery = failure.recovery();
            if recovery.marks_failed() {
                self.write_failed_status(state.message()).await;
            }

            let msg = state.message();
            let next = match recovery {
                Recovery::Reject => {
                    warn!(
                        target: DOI_ALERT,
                        "Not changing DOI {} to {}: {}", msg.doi, msg.status, failure
                    );
                    return Outcome::Rejected;
                }
                Recovery::Stop => {
                    warn!(
                        target: DOI_ALERT,
                        "DOI {} existed already when trying to change status to {}. Ignore",
                        msg.doi,
                        msg.status
                    );
                    return Outcome::Conflict;
                }
                Recovery::Truncate => {
                    warn!(
                        target: DOI_ALERT,
                        "Metadata of length {} exceeds the authority limit in attempt #{} while updating {} to {} with target {:?}. Trying again with truncated metadata",
                        msg.metadata.len(),
                        state.attempt(),
                        msg.doi,
                        msg.status,
                        msg.target
                    );
                    debug!("Original metadata for DOI {}:\n\n{}", msg.doi, msg.metadata);
                    match self
                        .truncator
                        .truncate(&msg.doi, &msg.metadata, msg.target.as_deref())
                    {
                        Ok(truncated) => state.next_with_metadata(truncated),
                        Err(e) => {
                            warn!("Failed to truncate metadata for DOI {}: {}", msg.doi, e);
                            self.pause_after(&state).await;
                            state.next()
                        }
                    }
                }
                Recovery::Backoff => {
                    warn!(
                        target: DOI_ALERT,
                        "DOI failure ({}) updating {} to {} with target {:?}. Attempt #{}",
                        failure,
                        msg.doi,
                        msg.status,
                        msg.target,
                        state.attempt()
                    );
                    self.pause_after(&state).await;
                    state.next()
                }
            };

            match next {
                Some(next) => state = next,
                None => {
                    error!(
                        target: DOI_ALERT,
                        "Giving up on DOI {} after {} attempts, left as {}",
                        state.message().doi,
                        MAX_ATTEMPTS,
                        DoiStatus::Failed
                    );
                    return Outcome::Exhausted;
                }
            }
        }
    }

    /// Pause before the next attempt; there is nothing to wait for after the last one
    async fn pause_after(&self, state: &AttemptState) {
        if !state.is_last() {
            self.backoff.pause().await;
        }
    }

    async fn dispatch(
        &self,
        msg: &ChangeDoiMessage,
        current: &StatusRecord,
    ) -> Result<Dispatched, FailureKind> {
        match msg.status {
            DoiStatus::Registered => self.register_or_update(msg, current).await?,
            DoiStatus::Reserved => self.reserve(msg, current).await?,
            DoiStatus::Deleted => self.delete(msg, current).await?,
            other => {
                warn!("Cannot update {} to illegal state {}.", msg.doi, other);
                return Ok(Dispatched::Ignored);
            }
        }
        Ok(Dispatched::Applied)
    }

    async fn register_or_update(
        &self,
        msg: &ChangeDoiMessage,
        current: &StatusRecord,
    ) -> Result<(), FailureKind> {
        let doi = &msg.doi;
        let target = msg
            .target
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                FailureKind::InvalidMetadata(format!("no target given to register {}", doi))
            })?;

        if current.status == DoiStatus::Registered {
            // already registered: move the target only if it changed, always refresh metadata
            if current.target.as_deref() != Some(target) {
                // metadata rejected after the target moved would leave the store stale
                validate_metadata_for(doi, &msg.metadata)?;
                self.service.update_target(doi, target).await?;
            }
            self.service.update_metadata(doi, &msg.metadata).await?;
            info!("Updated doi {} with target {}", doi, target);
        } else {
            self.service.register(doi, target, &msg.metadata).await?;
            info!("Registered doi {} with target {}", doi, target);
        }

        let data = DoiData::new(DoiStatus::Registered, Some(target.to_string()));
        self.store.update(doi, &data, Some(&msg.metadata)).await?;
        Ok(())
    }

    async fn reserve(&self, msg: &ChangeDoiMessage, current: &StatusRecord) -> Result<(), FailureKind> {
        self.service.reserve(&msg.doi, &msg.metadata).await?;
        info!("Reserved doi {}", msg.doi);

        let data = DoiData::new(DoiStatus::Reserved, current.target.clone());
        self.store.update(&msg.doi, &data, Some(&msg.metadata)).await?;
        Ok(())
    }

    async fn delete(&self, msg: &ChangeDoiMessage, current: &StatusRecord) -> Result<(), FailureKind> {
        let doi = &msg.doi;

        if current.status == DoiStatus::New {
            // never reached the authority, nothing to withdraw remotely
            self.store.delete(doi).await?;
            info!("Deleted unregistered doi {} locally", doi);
            return Ok(());
        }

        match self.service.delete(doi).await {
            Ok(true) => {
                self.store.delete(doi).await?;
                info!("Deleted doi {}", doi);
            }
            Ok(false) => {
                let data = DoiData::new(DoiStatus::Deleted, current.target.clone());
                self.store.update(doi, &data, None).await?;
                info!("Marked registered doi {} as deleted", doi);
            }
            Err(e) if e.is_not_found() => {
                warn!(
                    target: DOI_ALERT,
                    "Trying to delete DOI {} failed because it doesn't exist at the authority; deleting locally",
                    doi
                );
                self.store.delete(doi).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn write_failed_status(&self, msg: &ChangeDoiMessage) {
        let data = DoiData::new(DoiStatus::Failed, msg.target.clone());
        let metadata = (!msg.metadata.is_empty()).then_some(msg.metadata.as_str());
        if let Err(e) = self.store.update(&msg.doi, &data, metadata).await {
            error!("Failed to record FAILED status for DOI {}: {}", msg.doi, e);
        }
    }
}
