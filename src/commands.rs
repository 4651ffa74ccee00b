//! Command Builder
//!
//! Fluent assembly of an argument vector for a wrapped CLI (`kyverno`,
//! `kubectl`). Configuration that fails validation is dropped and logged,
//! never raised: the builder stays usable and the command simply runs
//! without the rejected flag. Dropped fields are recorded on the resulting
//! [`CommandSpec`] so callers can inspect them.
//!
//! Argument order is fixed: user args, then `--kubeconfig <path>`, then
//! `--output <format>`. The wrapped tools' parsers depend on it.

use crate::errors::ToolError;
use crate::security::validate_file_path;
use crate::shell::ShellExecutor;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Kyverno CLI binary name
pub const KYVERNO_BINARY: &str = "kyverno";

/// kubectl binary name
pub const KUBECTL_BINARY: &str = "kubectl";

/// Output formats accepted by `--output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Json,
    Yaml,
    Wide,
    Name,
    CustomColumns,
    CustomColumnsFile,
    GoTemplate,
    GoTemplateFile,
    JsonPath,
    JsonPathFile,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 10] = [
        OutputFormat::Json,
        OutputFormat::Yaml,
        OutputFormat::Wide,
        OutputFormat::Name,
        OutputFormat::CustomColumns,
        OutputFormat::CustomColumnsFile,
        OutputFormat::GoTemplate,
        OutputFormat::GoTemplateFile,
        OutputFormat::JsonPath,
        OutputFormat::JsonPathFile,
    ];

    /// The token passed on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Wide => "wide",
            OutputFormat::Name => "name",
            OutputFormat::CustomColumns => "custom-columns",
            OutputFormat::CustomColumnsFile => "custom-columns-file",
            OutputFormat::GoTemplate => "go-template",
            OutputFormat::GoTemplateFile => "go-template-file",
            OutputFormat::JsonPath => "jsonpath",
            OutputFormat::JsonPathFile => "jsonpath-file",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for tokens outside the accepted output formats
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid output format '{0}'")]
pub struct InvalidOutputFormat(pub String);

impl FromStr for OutputFormat {
    type Err = InvalidOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| InvalidOutputFormat(s.to_string()))
    }
}

/// A configuration value the builder refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedField {
    /// Builder field name (`kubeconfig`, `output`)
    pub field: &'static str,

    /// The rejected value
    pub value: String,

    /// Why it was rejected
    pub reason: String,
}

/// An execution-ready description of an external binary call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    binary: String,
    args: Vec<String>,
    kubeconfig: Option<String>,
    output: Option<OutputFormat>,
    timeout: Option<Duration>,
    discarded: Vec<DiscardedField>,
}

impl CommandSpec {
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// User arguments, without the kubeconfig/output suffix
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn kubeconfig(&self) -> Option<&str> {
        self.kubeconfig.as_deref()
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Recorded timeout; enforcement belongs to the caller's cancellation token
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Configuration dropped during building
    pub fn discarded(&self) -> &[DiscardedField] {
        &self.discarded
    }

    /// Final argument vector passed to the binary
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        argv.extend(self.args.iter().cloned());

        if let Some(kubeconfig) = &self.kubeconfig {
            argv.push("--kubeconfig".to_string());
            argv.push(kubeconfig.clone());
        }

        if let Some(output) = self.output {
            argv.push("--output".to_string());
            argv.push(output.as_str().to_string());
        }

        argv
    }
}

/// Fluent builder for [`CommandSpec`]
///
/// # Example
///
/// ```
/// use kyverno_tool_server::commands::CommandBuilder;
///
/// let spec = CommandBuilder::kyverno()
///     .with_args(["apply", "--cluster"])
///     .with_kubeconfig("/home/user/.kube/config")
///     .with_output_format("yaml")
///     .build();
///
/// assert_eq!(
///     spec.argv(),
///     ["apply", "--cluster", "--kubeconfig", "/home/user/.kube/config", "--output", "yaml"]
/// );
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct CommandBuilder {
    spec: CommandSpec,
}

impl CommandBuilder {
    /// Start a command for `binary` with no arguments
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            spec: CommandSpec {
                binary: binary.into(),
                args: Vec::new(),
                kubeconfig: None,
                output: None,
                timeout: None,
                discarded: Vec::new(),
            },
        }
    }

    pub fn kyverno() -> Self {
        Self::new(KYVERNO_BINARY)
    }

    pub fn kubectl() -> Self {
        Self::new(KUBECTL_BINARY)
    }

    /// Append arguments verbatim
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set `--kubeconfig` if the path passes validation
    ///
    /// An empty path is a no-op. A rejected path leaves the kubeconfig unset.
    pub fn with_kubeconfig(mut self, path: &str) -> Self {
        if path.is_empty() {
            return self;
        }

        match validate_file_path(path) {
            Ok(()) => self.spec.kubeconfig = Some(path.to_string()),
            Err(e) => {
                warn!(error = %e, "ignoring invalid kubeconfig path");
                self.spec.discarded.push(DiscardedField {
                    field: "kubeconfig",
                    value: path.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    /// Set `--output` if `token` is a known output format
    pub fn with_output_format(mut self, token: &str) -> Self {
        match token.parse::<OutputFormat>() {
            Ok(format) => self.spec.output = Some(format),
            Err(e) => {
                warn!(output = %token, "invalid output format");
                self.spec.discarded.push(DiscardedField {
                    field: "output",
                    value: token.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    /// Record an intended timeout (not enforced here)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> CommandSpec {
        self.spec
    }

    /// Build and run the command through `executor`
    ///
    /// Returns the raw captured output. Any execution failure is reported as a
    /// `COMMAND_ERROR` [`ToolError`] carrying the captured output in its
    /// context.
    pub async fn execute(
        self,
        executor: &dyn ShellExecutor,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let spec = self.build();
        let argv = spec.argv();

        debug!(command = %spec.binary, args = ?argv, "executing command");

        match executor.exec(cancel, &spec.binary, &argv).await {
            Ok(result) => Ok(result.output),
            Err(e) => {
                let output = e.output().to_string();
                let exit_code = e.exit_code();

                let mut err = ToolError::command(&spec.binary, e).with_context("output", output);
                if let Some(code) = exit_code {
                    err = err.with_context("exit_code", code);
                }
                err.log();
                Err(err)
            }
        }
    }
}
