// Configuration File Support
//
// TOML configuration with environment variable and command-line overrides.
// Precedence, highest first: CLI flags, environment, config file, defaults.

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "KYVERNO_AGENT_LOG_LEVEL";
/// Environment variable overriding `logging.format`
pub const ENV_LOG_FORMAT: &str = "KYVERNO_AGENT_LOG_FORMAT";
/// Environment variable overriding `server.port`
pub const ENV_PORT: &str = "KYVERNO_AGENT_PORT";
/// Environment variable overriding `kyverno.binary`
pub const ENV_BINARY: &str = "KYVERNO_AGENT_BINARY";
/// Standard kubeconfig discovery variable
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub kyverno: KyvernoConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (compact, pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Network transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port in network mode
    pub port: u16,

    /// Interval between SSE keep-alive pulses
    pub heartbeat_interval_secs: u64,

    /// How long shutdown waits for in-flight HTTP requests
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            heartbeat_interval_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Kyverno CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KyvernoConfig {
    /// Binary to invoke (name on PATH or absolute path)
    pub binary: String,

    /// Kubeconfig passed to every invocation
    pub kubeconfig: Option<String>,

    /// Output format passed to every invocation
    pub output_format: Option<String>,
}

impl Default for KyvernoConfig {
    fn default() -> Self {
        Self {
            binary: crate::commands::KYVERNO_BINARY.to_string(),
            kubeconfig: None,
            output_format: None,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub kubeconfig: Option<String>,
    pub verbose: bool,
}

impl Config {
    /// Build the effective configuration
    ///
    /// Starts from the file at `path` (or defaults when `None`), then applies
    /// the process environment and finally `cli`.
    pub fn resolve(path: Option<&Path>, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };

        let config = config
            .apply_env_overrides(|var| std::env::var(var).ok())?
            .apply_cli_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// An explicitly named file must exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides
    ///
    /// `lookup` returns the value of a variable, if set.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_LOG_FORMAT,
                value: format,
            })?;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value: port,
            })?;
        }
        if let Some(binary) = lookup(ENV_BINARY) {
            self.kyverno.binary = binary;
        }
        if let Some(kubeconfig) = lookup(ENV_KUBECONFIG).filter(|k| !k.is_empty()) {
            self.kyverno.kubeconfig = Some(kubeconfig);
        }

        Ok(self)
    }

    /// Apply command-line overrides
    pub fn apply_cli_overrides(mut self, cli: &CliOverrides) -> Self {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(kubeconfig) = &cli.kubeconfig {
            self.kyverno.kubeconfig = Some(kubeconfig.clone());
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("Server port must be > 0".to_string()));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "Heartbeat interval must be at least 1 second".to_string(),
            ));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Shutdown timeout must be at least 1 second".to_string(),
            ));
        }
        if self.kyverno.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("Kyverno binary must not be empty".to_string()));
        }

        Ok(())
    }

    /// Settings handed to the Kyverno tools
    pub fn kyverno_settings(&self) -> crate::tools::KyvernoSettings {
        crate::tools::KyvernoSettings {
            binary: self.kyverno.binary.clone(),
            kubeconfig: self.kyverno.kubeconfig.clone(),
            output_format: self.kyverno.output_format.clone(),
        }
    }
}
