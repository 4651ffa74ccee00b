// Structured logging setup
//
// The subscriber is installed once by the binary. In stdio mode stdout carries
// the JSON-RPC stream, so logs go to stderr.

use crate::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                other
            )),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

/// Flushes both output streams when dropped
///
/// Hold it in `main` for the lifetime of the process.
#[derive(Debug)]
#[must_use = "logs may be lost if the guard is dropped early"]
pub struct LoggingGuard {
    target: LogTarget,
}

impl LoggingGuard {
    pub fn target(&self) -> LogTarget {
        self.target
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

/// Build the filter from the configured level
///
/// `RUST_LOG` directives, when present, are layered on top.
pub fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let level: tracing::Level = level
        .parse()
        .map_err(|e| anyhow::anyhow!("Failed to parse log level {}: {}", level, e))?;

    Ok(EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy())
}

/// Install the global tracing subscriber
pub fn init(config: &LoggingConfig, target: LogTarget) -> anyhow::Result<LoggingGuard> {
    let filter = build_filter(&config.level)?;
    let writer = match target {
        LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(LoggingGuard { target })
}
