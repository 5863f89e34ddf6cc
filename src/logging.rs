/// Structured logging setup using tracing
///
/// Writes to stderr ONLY so log records never interleave with run files or the
/// expansion clauses printed by `ranklab expand`.
/// Format follows config.log_format: "pretty", "json", or "auto" (pretty with ANSI
/// colors when stderr is a terminal, JSON lines when piped/redirected).

use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::Config;
use crate::errors::RankError;

/// Output format of the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Auto,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(LogFormat::Auto),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(RankError::Config(format!("Unknown log format: {}", other))),
        }
    }
}

impl LogFormat {
    fn use_json(self) -> bool {
        match self {
            LogFormat::Json => true,
            LogFormat::Pretty => false,
            LogFormat::Auto => !std::io::stderr().is_terminal(),
        }
    }
}

/// Initialize tracing subscriber with stderr-only output
///
/// Log level from config.log_level (default: info)
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) -> Result<(), RankError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let format: LogFormat = config.log_format.parse()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if format.use_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal())
            )
            .try_init()
    };

    installed.map_err(|e| RankError::Config(format!("Failed to install logger: {}", e)))
}
