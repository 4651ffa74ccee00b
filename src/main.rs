// Kyverno Tool Server - Main Entry Point
//
// Parses the CLI, resolves configuration, installs logging and runs one MCP
// transport until SIGINT/SIGTERM (or stdin EOF in stdio mode).

use anyhow::{Context, Result};
use clap::Parser;
use kyverno_tool_server::config::{CliOverrides, Config};
use kyverno_tool_server::logging::{self, LogTarget};
use kyverno_tool_server::mcp::McpServer;
use kyverno_tool_server::metrics::Metrics;
use kyverno_tool_server::server::{self, HttpOptions, Transport};
use kyverno_tool_server::shell::{ProcessExecutor, ShellExecutor};
use kyverno_tool_server::tools::{register_tools, ToolRegistry};
use kyverno_tool_server::{SERVER_NAME, SERVER_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Kyverno Tool Server: run Kyverno policy commands for MCP agents
#[derive(Parser, Debug)]
#[command(name = "kyverno-tool-server")]
#[command(author = "Kyverno Agent Contributors")]
#[command(version)]
#[command(about = "MCP server exposing Kyverno policy tools", long_about = None)]
struct Args {
    /// Port to listen on in network mode [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve over stdin/stdout instead of HTTP
    #[arg(short, long)]
    stdio: bool,

    /// Kubeconfig passed to every Kyverno invocation
    #[arg(short, long)]
    kubeconfig: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            kubeconfig: self.kubeconfig.clone(),
            verbose: self.verbose,
        }
    }
}

/// How long runtime teardown waits for blocking tasks
///
/// A stdin read blocked on an open pipe never completes on its own.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let result = runtime.block_on(serve(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn serve(args: Args) -> Result<()> {
    let config = Config::resolve(args.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;

    let target = if args.stdio {
        LogTarget::Stderr
    } else {
        LogTarget::Stdout
    };
    let _logging = logging::init(&config.logging, target)?;

    info!(version = SERVER_VERSION, "Kyverno tool server starting");

    let metrics = Arc::new(Metrics::new().context("Failed to initialize metrics")?);
    let executor: Arc<dyn ShellExecutor> = Arc::new(ProcessExecutor::new());

    let mut registry = ToolRegistry::new();
    register_tools(&mut registry, executor, config.kyverno_settings());
    info!(tools = registry.len(), binary = %config.kyverno.binary, "registered tools");

    let mcp = Arc::new(McpServer::new(SERVER_NAME, SERVER_VERSION, registry).with_metrics(metrics));

    let transport = if args.stdio {
        Transport::Stdio
    } else {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        Transport::Http(listener)
    };

    let options = HttpOptions {
        heartbeat_interval: config.server.heartbeat_interval(),
        drain_timeout: config.server.shutdown_timeout(),
    };

    server::run(transport, mcp, options, server::wait_for_signal()).await?;

    info!("Kyverno tool server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["kyverno-tool-server"]).unwrap();
        assert!(!args.stdio);
        assert!(!args.verbose);
        assert_eq!(args.overrides(), CliOverrides::default());
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::try_parse_from([
            "kyverno-tool-server",
            "-p",
            "9000",
            "-s",
            "-k",
            "/root/.kube/config",
            "-v",
        ])
        .unwrap();

        assert!(args.stdio);
        assert_eq!(
            args.overrides(),
            CliOverrides {
                port: Some(9000),
                kubeconfig: Some("/root/.kube/config".to_string()),
                verbose: true,
            }
        );
    }

    #[test]
    fn test_args_config_path() {
        let args =
            Args::try_parse_from(["kyverno-tool-server", "--config", "/etc/kyverno-agent.toml"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/kyverno-agent.toml")));
    }

    #[test]
    fn test_args_invalid_port() {
        assert!(Args::try_parse_from(["kyverno-tool-server", "--port", "99999"]).is_err());
    }
}
