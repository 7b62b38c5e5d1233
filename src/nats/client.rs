//! NATS client wrapper
//!
//! Connection management for the JetStream consumer. Reconnection after a
//! successful first connect is handled by `async_nats`.

use async_nats::{jetstream, Client, ConnectOptions};
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::UpdaterError;

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Initial connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// NATS client wrapper with JetStream support
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self, UpdaterError> {
        info!("Connecting to NATS at {}", args.nats_url);

        // fail fast on the first connect, a missing broker is a deployment error
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(CONNECT_TIMEOUT);

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| UpdaterError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {} as {}", args.nats_url, name);

        Ok(Self { client })
    }

    /// JetStream context on this connection
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }
}
