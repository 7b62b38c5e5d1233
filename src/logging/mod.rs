//! Logging setup
//!
//! Plain or JSON `tracing` output. Failures an operator has to act on are
//! emitted on the [`DOI_ALERT`] target so a subscriber layer can route them
//! to mail or paging separately from the regular log stream.

use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing target for DOI failures that need operator attention
pub const DOI_ALERT: &str = "doi_alert";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Default filter directive when `RUST_LOG` is not set
pub fn default_directive(log_level: &str) -> String {
    format!("doi_updater={},{}=warn,info", log_level, DOI_ALERT)
}

/// Install the global tracing subscriber
pub fn init(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
    }
}
