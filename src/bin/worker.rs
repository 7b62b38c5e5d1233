//! DOI updater worker
//!
//! Consumes DOI change messages from NATS JetStream and applies them to
//! DataCite and the DOI store.
//!
//! Usage:
//!   doi-updater --nats-url nats://localhost:4222 --datacite-username GBIF.GBIF
//!
//! Environment variables:
//!   NATS_URL - NATS server URL (default: nats://127.0.0.1:4222)
//!   MONGODB_URI - MongoDB connection URI (default: mongodb://localhost:27017)
//!   DATACITE_API_URL - DataCite MDS base URL (default: https://mds.test.datacite.org)
//!   DATACITE_USERNAME / DATACITE_PASSWORD - DataCite credentials
//!   RETRY_DELAY_MS - Pause between failed attempts (default: 60000)
//!   MAX_CONCURRENT - Maximum concurrent messages (default: 10)

use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use doi_updater::{
    authority::DataCiteClient,
    config::Args,
    db::{DoiStore, InMemoryDoiStore, MongoClient, MongoDoiStore},
    logging,
    metadata::MetadataTruncator,
    nats::NatsClient,
    worker::{Backoff, DoiReconciler, Worker, WorkerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  DOI updater");
    info!("======================================");
    info!("Worker ID: {}", args.worker_id);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("NATS: {} ({}.>)", args.nats.nats_url, args.doi_subject);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("DataCite: {}", args.datacite.datacite_api_url);
    info!("Retry delay: {:?}", args.retry_delay());
    info!("Concurrency: {}", args.max_concurrent);
    info!("======================================");

    // Connect to MongoDB (in-memory store in dev mode)
    let store: Arc<dyn DoiStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await
    {
        Ok(client) => Arc::new(MongoDoiStore::new(&client).await?),
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            Arc::new(InMemoryDoiStore::new())
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let service = Arc::new(DataCiteClient::new(args.datacite.to_config())?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Arc::new(DoiReconciler::new(
        store,
        service,
        MetadataTruncator::new(args.description_max_chars),
        Backoff::new(args.retry_delay(), shutdown_rx),
    ));

    let nats = NatsClient::new(&args.nats, &format!("doi-updater-{}", args.worker_id)).await?;

    let config = WorkerConfig {
        worker_id: args.worker_id.to_string(),
        stream_name: args.doi_stream.clone(),
        subject_prefix: args.doi_subject.clone(),
        max_concurrent: args.max_concurrent,
        ack_wait: WorkerConfig::ack_wait_for(args.retry_delay(), args.request_timeout()),
        nak_delay: args.retry_delay(),
    };
    let worker = Arc::new(Worker::new(config, &nats, reconciler, shutdown_tx));

    // Stop on ctrl-c; the loop returns once in-flight messages are settled
    {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            worker.stop();
        });
    }

    if let Err(e) = worker.run().await {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutting down");
    Ok(())
}
