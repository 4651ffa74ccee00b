//! Transport Lifecycle
//!
//! Runs exactly one transport for the life of the process and coordinates
//! shutdown:
//!
//! - `stdio`: newline-delimited JSON-RPC over stdin/stdout
//! - `http`: axum listener with `/health`, `/metrics` and the MCP endpoint
//!
//! A signal coordinator task cancels the shared root token on SIGINT/SIGTERM.
//! [`run`] returns only after the transport task has been joined.

pub mod http;
pub mod stdio;

use crate::mcp::McpServer;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The transport chosen at startup
#[derive(Debug)]
pub enum Transport {
    Stdio,
    Http(TcpListener),
}

/// Network mode timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    /// Interval between SSE keep-alive pulses
    pub heartbeat_interval: Duration,

    /// Budget for in-flight requests once shutdown starts
    pub drain_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Run `transport` until `shutdown_signal` resolves or the transport ends
/// on its own (stdin closed)
pub async fn run<F>(
    transport: Transport,
    server: Arc<McpServer>,
    options: HttpOptions,
    shutdown_signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let root = CancellationToken::new();

    let transport_task = {
        let root = root.clone();
        match transport {
            Transport::Stdio => tokio::spawn(async move {
                stdio::serve(tokio::io::stdin(), tokio::io::stdout(), server, root).await
            }),
            Transport::Http(listener) => tokio::spawn(async move {
                let router = http::router(server, root.clone(), options.heartbeat_interval);
                http::serve(listener, router, root, options.drain_timeout).await
            }),
        }
    };

    let coordinator = {
        let root = root.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal => {
                    info!("shutdown signal received, cancelling in-flight work");
                    root.cancel();
                }
                _ = root.cancelled() => {}
            }
        })
    };

    let result = transport_task.await.context("transport task panicked")?;

    // Release the coordinator when the transport ended without a signal
    root.cancel();
    coordinator.await.context("signal coordinator panicked")?;

    info!("transport stopped");
    result
}

/// Resolves on SIGINT or, on Unix, SIGTERM
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
