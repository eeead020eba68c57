//! Unified logging system
//!
//! Structured logging through `tracing`, configured once per process.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to emit a line when spans close (request timings)
    pub span_timings: bool,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            span_timings: false,
            filter_directives: vec![
                "gym_core=info".to_string(),
                "gym_access=info".to_string(),
                "gym_web=info".to_string(),
                "tower_http=info".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Override the level of the workspace crates
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self.filter_directives = ["gym_core", "gym_access", "gym_web"]
            .iter()
            .map(|target| format!("{}={}", target, level))
            .chain(std::iter::once("tower_http=debug".to_string()))
            .collect();
        self
    }
}

/// Build the event filter.
///
/// A valid, non-empty `env` directive string replaces the configured level
/// and directives entirely. Otherwise the configured ones apply.
fn build_filter(
    config: &LoggingConfig,
    env: Option<&str>,
) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(filter) = env
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return Ok(filter);
    }

    let mut filter = EnvFilter::new(&config.level);
    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level and directives
/// when set.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(config, env.as_deref())?;

    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?,
    }

    Ok(())
}
