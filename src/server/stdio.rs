//! Standard-I/O transport
//!
//! Reads one JSON-RPC message per line and writes one response per line.

use crate::mcp::McpServer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Serve requests from `reader` until it closes or `shutdown` fires
pub async fn serve<R, W>(
    reader: R,
    mut writer: W,
    server: Arc<McpServer>,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("serving MCP over stdio");
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("stdio transport cancelled");
                break;
            }
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };

        let Some(line) = line else {
            info!("stdin closed");
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request_token = shutdown.child_token();
        if let Some(response) = server.handle_message(line, &request_token).await {
            let mut payload =
                serde_json::to_vec(&response).context("Failed to encode JSON-RPC response")?;
            payload.push(b'\n');
            writer
                .write_all(&payload)
                .await
                .context("Failed to write to stdout")?;
            writer.flush().await.context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
