//! Shell Executor
//!
//! Process execution seam for the command builder. The default
//! [`ProcessExecutor`] spawns the binary directly (never through a shell),
//! captures its output and kills it if the caller's cancellation token fires
//! before it exits. Callers receive the executor explicitly, so tests can pass
//! a substitute that never touches the OS.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a completed process execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Combined stdout followed by stderr (lossy UTF-8)
    pub output: String,

    /// Wall-clock execution time
    pub duration: Duration,

    /// Whether the process exited with status zero
    pub success: bool,
}

impl ExecutionResult {
    /// Successful result carrying `output`
    pub fn success(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            output: output.into(),
            duration,
            success: true,
        }
    }
}

/// Errors raised while executing an external process
///
/// Every variant keeps whatever output was captured before the failure.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The process could not be started
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("'{command}' exited with {}", exit_label(.exit_code))]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The caller's cancellation token fired before the process exited
    #[error("'{command}' was cancelled before completion")]
    Cancelled { command: String, output: String },

    /// Reading output or waiting on the process failed
    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        output: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

impl ShellError {
    /// Output captured before the failure (empty when nothing was captured)
    pub fn output(&self) -> &str {
        match self {
            ShellError::Spawn { .. } => "",
            ShellError::NonZeroExit { output, .. }
            | ShellError::Cancelled { output, .. }
            | ShellError::Io { output, .. } => output,
        }
    }

    /// Exit code of the process, when it exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellError::NonZeroExit { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Abstraction over external process invocation
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run `command` with `args`, bound to `cancel`
    ///
    /// Implementations must not retry and must not impose their own timeout.
    async fn exec(
        &self,
        cancel: &CancellationToken,
        command: &str,
        args: &[String],
    ) -> Result<ExecutionResult, ShellError>;
}

/// Default executor backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ShellExecutor for ProcessExecutor {
    async fn exec(
        &self,
        cancel: &CancellationToken,
        command: &str,
        args: &[String],
    ) -> Result<ExecutionResult, ShellError> {
        let start = Instant::now();

        let mut child = TokioCommand::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                warn!(command = %command, error = %source, "failed to spawn command");
                ShellError::Spawn {
                    command: command.to_string(),
                    source,
                }
            })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        // Drain both pipes while waiting so a chatty child never blocks on a full pipe
        let run = async {
            let read_out = async {
                match stdout.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut out_buf).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            let read_err = async {
                match stderr.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut err_buf).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            let (out_res, err_res) = tokio::join!(read_out, read_err);
            out_res?;
            err_res?;
            child.wait().await
        };

        let outcome = tokio::select! {
            status = run => Some(status),
            _ = cancel.cancelled() => None,
        };

        let duration = start.elapsed();
        let output = combine_output(&out_buf, &err_buf);

        match outcome {
            None => {
                // The pipes future is dropped; kill the child and reap it
                if let Err(e) = child.kill().await {
                    warn!(command = %command, error = %e, "failed to kill cancelled command");
                }
                warn!(command = %command, ?duration, "command cancelled");
                Err(ShellError::Cancelled {
                    command: command.to_string(),
                    output,
                })
            }
            Some(Err(source)) => {
                warn!(command = %command, error = %source, ?duration, "command I/O failed");
                Err(ShellError::Io {
                    command: command.to_string(),
                    output,
                    source,
                })
            }
            Some(Ok(status)) if status.success() => {
                debug!(command = %command, ?args, ?duration, "command execution succeeded");
                Ok(ExecutionResult {
                    output,
                    duration,
                    success: true,
                })
            }
            Some(Ok(status)) => {
                warn!(
                    command = %command,
                    ?args,
                    exit_code = ?status.code(),
                    ?duration,
                    "command execution failed"
                );
                Err(ShellError::NonZeroExit {
                    command: command.to_string(),
                    exit_code: status.code(),
                    output,
                })
            }
        }
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined
}
