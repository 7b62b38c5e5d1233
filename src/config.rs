//! Configuration for the DOI updater
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;
use uuid::Uuid;

use crate::authority::DataCiteConfig;
use crate::logging::LogFormat;
use crate::types::UpdaterError;
use crate::worker::{STREAM_NAME, SUBJECT_PREFIX};

/// DOI updater - keeps the DOI registration authority in step with the registry
#[derive(Parser, Debug, Clone)]
#[command(name = "doi-updater")]
#[command(about = "Applies DOI change messages to DataCite and the DOI store")]
pub struct Args {
    /// Unique identifier for this worker instance
    #[arg(long, env = "WORKER_ID", default_value_t = Uuid::new_v4())]
    pub worker_id: Uuid,

    /// Enable development mode (in-memory store when MongoDB is unavailable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// JetStream stream carrying DOI change messages
    #[arg(long, env = "DOI_STREAM", default_value = STREAM_NAME)]
    pub doi_stream: String,

    /// Subject prefix of DOI change messages (consumed as `<prefix>.>`)
    #[arg(long, env = "DOI_SUBJECT", default_value = SUBJECT_PREFIX)]
    pub doi_subject: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "registry")]
    pub mongodb_db: String,

    /// DataCite configuration
    #[command(flatten)]
    pub datacite: DataCiteArgs,

    /// Pause between failed attempts in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value = "60000")]
    pub retry_delay_ms: u64,

    /// Maximum number of messages handled at the same time
    #[arg(long, env = "MAX_CONCURRENT", default_value = "10")]
    pub max_concurrent: usize,

    /// Description length kept when metadata has to be truncated
    #[arg(long, env = "DESCRIPTION_MAX_CHARS", default_value = "2000")]
    pub description_max_chars: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

/// DataCite MDS configuration
#[derive(Parser, Debug, Clone)]
pub struct DataCiteArgs {
    /// DataCite MDS base URL
    #[arg(long, env = "DATACITE_API_URL", default_value = "https://mds.test.datacite.org")]
    pub datacite_api_url: String,

    /// DataCite repository account
    #[arg(long, env = "DATACITE_USERNAME", default_value = "")]
    pub datacite_username: String,

    /// DataCite repository password
    #[arg(long, env = "DATACITE_PASSWORD", default_value = "")]
    pub datacite_password: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "DATACITE_TIMEOUT_MS", default_value = "30000")]
    pub datacite_timeout_ms: u64,
}

impl DataCiteArgs {
    pub fn to_config(&self) -> DataCiteConfig {
        DataCiteConfig {
            api_url: self.datacite_api_url.clone(),
            username: self.datacite_username.clone(),
            password: self.datacite_password.clone(),
            timeout_ms: self.datacite_timeout_ms,
        }
    }
}

impl Args {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.datacite.datacite_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), UpdaterError> {
        if !self.dev_mode
            && (self.datacite.datacite_username.is_empty()
                || self.datacite.datacite_password.is_empty())
        {
            return Err(UpdaterError::Config(
                "DATACITE_USERNAME and DATACITE_PASSWORD are required in production mode".into(),
            ));
        }

        if self.max_concurrent == 0 {
            return Err(UpdaterError::Config(
                "MAX_CONCURRENT must be at least 1".into(),
            ));
        }

        if self.description_max_chars == 0 {
            return Err(UpdaterError::Config(
                "DESCRIPTION_MAX_CHARS must be at least 1".into(),
            ));
        }

        if self.doi_subject.is_empty() || self.doi_subject.ends_with('.') {
            return Err(UpdaterError::Config(format!(
                "DOI_SUBJECT must be a subject prefix, got '{}'",
                self.doi_subject
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["doi-updater"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.doi_stream, "REGISTRY_DOI");
        assert_eq!(args.doi_subject, "registry.doi");
        assert_eq!(args.retry_delay(), Duration::from_secs(60));
        assert_eq!(args.description_max_chars, 2000);
        assert_eq!(args.log_format, LogFormat::Text);
        assert_ok!(args.validate());
    }

    #[test]
    fn test_credentials_required_outside_dev_mode() {
        let args = parse(&[]);
        assert!(matches!(args.validate(), Err(UpdaterError::Config(_))));

        let args = parse(&[
            "--datacite-username",
            "GBIF.GBIF",
            "--datacite-password",
            "secret",
        ]);
        assert_ok!(args.validate());
        assert_eq!(args.datacite.to_config().username, "GBIF.GBIF");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = parse(&["--dev-mode", "--max-concurrent", "0"]);
        assert_err!(args.validate());
    }

    #[test]
    fn test_json_log_format() {
        let args = parse(&["--log-format", "json"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
