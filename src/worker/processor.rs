//! Worker processor - NATS JetStream consumer for DOI change messages
//!
//! Pulls change messages from the registry stream, hands each to the
//! [`DoiReconciler`] and acknowledges it once handling has finished.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream, AckKind};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::attempt::MAX_ATTEMPTS;
use super::reconciler::{DoiReconciler, Outcome};
use crate::db::STORE_TIMEOUT;
use crate::doi::ChangeDoiMessage;
use crate::nats::NatsClient;
use crate::types::{Result, UpdaterError};

/// NATS names for DOI change messages
pub const STREAM_NAME: &str = "REGISTRY_DOI";
pub const SUBJECT_PREFIX: &str = "registry.doi";
/// Shared by all instances so each message goes to exactly one of them
pub const CONSUMER_NAME: &str = "doi_updater";

/// How long a fetch waits for messages before returning an empty batch
const FETCH_EXPIRY: Duration = Duration::from_secs(5);

/// Authority requests one registration attempt can make: two resolves, metadata, DOI
const REQUESTS_PER_ATTEMPT: u32 = 4;
/// Store calls one attempt can make: the FAILED marker or the final write, plus slack
const STORE_CALLS_PER_ATTEMPT: u32 = 2;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Unique worker ID
    pub worker_id: String,
    /// Stream holding change messages
    pub stream_name: String,
    /// Subjects consumed are `<subject_prefix>.>`
    pub subject_prefix: String,
    /// Maximum messages handled concurrently
    pub max_concurrent: usize,
    /// Time a delivered message may stay unacknowledged
    pub ack_wait: Duration,
    /// Redelivery delay for messages that could not be attempted
    pub nak_delay: Duration,
}

impl WorkerConfig {
    /// Upper bound for one message once its lease is held: the initial
    /// store read, then per attempt every authority request and store call
    /// at its timeout, with a pause after all but the last attempt.
    pub fn ack_wait_for(retry_delay: Duration, request_timeout: Duration) -> Duration {
        let requests = request_timeout * REQUESTS_PER_ATTEMPT * MAX_ATTEMPTS;
        let store = STORE_TIMEOUT * (1 + STORE_CALLS_PER_ATTEMPT * MAX_ATTEMPTS);
        let pauses = retry_delay * (MAX_ATTEMPTS - 1);
        requests + store + pauses + Duration::from_secs(30)
    }

    /// How often a message in progress resets its ack timer. Also covers
    /// time spent queued behind another delivery of the same DOI.
    pub fn progress_interval(&self) -> Duration {
        (self.ack_wait / 3).max(Duration::from_secs(1))
    }

    pub fn filter_subject(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            stream_name: STREAM_NAME.to_string(),
            subject_prefix: SUBJECT_PREFIX.to_string(),
            max_concurrent: 10,
            ack_wait: Self::ack_wait_for(Duration::from_secs(60), Duration::from_secs(30)),
            nak_delay: Duration::from_secs(60),
        }
    }
}

/// Backend worker that consumes DOI change messages
pub struct Worker {
    config: WorkerConfig,
    jetstream: jetstream::Context,
    reconciler: Arc<DoiReconciler>,
    shutdown: watch::Sender<bool>,
}

impl Worker {
    /// Create a worker on an established NATS connection.
    ///
    /// `shutdown` is the sender half of the channel the reconciler's backoff
    /// listens on, so [`Worker::stop`] also cuts pending retry pauses short.
    pub fn new(
        config: WorkerConfig,
        nats: &NatsClient,
        reconciler: Arc<DoiReconciler>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        info!(
            "Worker {} consuming {} from stream {}",
            config.worker_id,
            config.filter_subject(),
            config.stream_name
        );

        Self {
            config,
            jetstream: nats.jetstream(),
            reconciler,
            shutdown,
        }
    }

    /// Run the worker processing loop until [`Worker::stop`] is called
    pub async fn run(&self) -> Result<()> {
        let stream = self.ensure_stream().await?;
        let consumer = self.ensure_consumer(&stream).await?;

        info!(
            "Worker {} starting DOI processing loop",
            self.config.worker_id
        );

        let mut shutdown = self.shutdown.subscribe();
        while !*shutdown.borrow_and_update() {
            match self.process_batch(&consumer).await {
                Ok(count) => {
                    if count > 0 {
                        debug!("Processed {} DOI messages", count);
                    }
                }
                Err(e) => {
                    error!("Error processing batch: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Worker {} stopped", self.config.worker_id);
        Ok(())
    }

    /// Stop the worker; messages in flight finish their current step first
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Ensure the change stream exists
    async fn ensure_stream(&self) -> Result<Stream> {
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: self.config.stream_name.clone(),
                subjects: vec![self.config.filter_subject()],
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| UpdaterError::Nats(format!("Failed to create stream: {e}")))?;

        info!(
            "Using stream {} with subjects {}",
            self.config.stream_name,
            self.config.filter_subject()
        );
        Ok(stream)
    }

    /// Ensure the shared durable consumer exists
    async fn ensure_consumer(&self, stream: &Stream) -> Result<PullConsumer> {
        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: self.config.ack_wait,
                    filter_subject: self.config.filter_subject(),
                    max_ack_pending: self.config.max_concurrent as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| UpdaterError::Nats(format!("Failed to create consumer: {e}")))?;

        info!(
            "Using consumer {} (ack wait {:?})",
            CONSUMER_NAME, self.config.ack_wait
        );
        Ok(consumer)
    }

    /// Fetch a batch and handle its messages concurrently
    async fn process_batch(&self, consumer: &PullConsumer) -> Result<usize> {
        let messages = consumer
            .fetch()
            .max_messages(self.config.max_concurrent)
            .expires(FETCH_EXPIRY)
            .messages()
            .await
            .map_err(|e| UpdaterError::Nats(format!("Failed to fetch messages: {e}")))?;

        let received = messages.filter_map(|msg_result| async move {
            match msg_result {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!("Error receiving message: {}", e);
                    None
                }
            }
        });

        let mut count = 0;
        received
            .map(|msg| {
                count += 1;
                msg
            })
            .for_each_concurrent(self.config.max_concurrent, |msg| self.process_message(msg))
            .await;

        Ok(count)
    }

    /// Handle a single message and settle it with the broker
    async fn process_message(&self, msg: jetstream::Message) {
        let change = match serde_json::from_slice::<ChangeDoiMessage>(&msg.payload) {
            Ok(change) => change,
            Err(e) => {
                error!(
                    "Dropping malformed DOI message on {}: {}",
                    msg.subject, e
                );
                if let Err(e) = msg.ack().await {
                    warn!("Failed to ack malformed message: {}", e);
                }
                return;
            }
        };

        let doi = change.doi.clone();
        let handled = self.reconciler.handle(change);
        tokio::pin!(handled);

        let period = self.config.progress_interval();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let outcome = loop {
            tokio::select! {
                outcome = &mut handled => break outcome,
                _ = heartbeat.tick() => {
                    if let Err(e) = msg.ack_with(AckKind::Progress).await {
                        warn!("Failed to extend ack wait for DOI {}: {}", doi, e);
                    }
                }
            }
        };
        debug!("DOI {} handled: {:?}", doi, outcome);

        if let Err(e) = msg.ack_with(ack_kind(outcome, self.config.nak_delay)).await {
            warn!("Failed to ack message for DOI {}: {}", doi, e);
        }
    }
}

/// How a handled message is settled with the broker
fn ack_kind(outcome: Outcome, nak_delay: Duration) -> AckKind {
    match outcome {
        // nothing was attempted, redeliver once the store had time to recover
        Outcome::StoreUnavailable => AckKind::Nak(Some(nak_delay)),
        _ => AckKind::Ack,
    }
}
