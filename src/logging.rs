//! # Structured Logging
//!
//! Environment-aware `tracing` setup. Initialization happens at most once per
//! process and tolerates a subscriber installed by the host application.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; everything else is human readable
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize structured logging for the current environment
///
/// `RUST_LOG` overrides the environment's default level. `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment(|name| std::env::var(name).ok());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level_for(&environment)));
        let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());

        let layer = match format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already installed, keeping it");
            return;
        }

        tracing::info!(
            environment = %environment,
            format = ?format,
            pid = std::process::id(),
            "Structured logging initialized"
        );
    });
}

/// `APP_ENV`, then `ENVIRONMENT`, then `development`
pub fn detect_environment<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("APP_ENV")
        .or_else(|| lookup("ENVIRONMENT"))
        .filter(|env| !env.trim().is_empty())
        .unwrap_or_else(|| "development".to_string())
}

/// Default filter directive for an environment
pub fn log_level_for(environment: &str) -> &'static str {
    match environment {
        "production" | "staging" => "info",
        _ => "debug",
    }
}
