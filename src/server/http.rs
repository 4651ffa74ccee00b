//! HTTP transport
//!
//! Routes:
//! - `GET /health`: liveness, always `200 OK`
//! - `GET /metrics`: Prometheus text
//! - everything else: the MCP endpoint (`POST` JSON-RPC, `GET` event stream,
//!   `DELETE` session end)

use crate::mcp::McpServer;
use crate::metrics::Metrics;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Header carrying the session id assigned on `initialize`
pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    shutdown: CancellationToken,
    heartbeat: Duration,
}

/// Build the router
///
/// `shutdown` is the root token: request tokens are its children and event
/// streams end when it fires.
pub fn router(server: Arc<McpServer>, shutdown: CancellationToken, heartbeat: Duration) -> Router {
    let state = AppState {
        server,
        shutdown,
        heartbeat,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(mcp_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` fires
///
/// Stops accepting immediately on shutdown and gives in-flight requests up
/// to `drain` to finish. Connections still open after that are abandoned.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    drain: Duration,
) -> Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!(%addr, "serving MCP over HTTP");

    let signal = shutdown.clone().cancelled_owned();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.context("HTTP server error")?;
        }
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(drain).await;
        } => {
            warn!(?drain, "drain deadline exceeded, abandoning open connections");
        }
    }

    info!(%addr, "HTTP listener closed");
    Ok(())
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.server.metrics() else {
        return (StatusCode::NOT_FOUND, "metrics disabled").into_response();
    };

    match metrics.gather() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn mcp_handler(State(state): State<AppState>, method: Method, body: String) -> Response {
    if method == Method::POST {
        handle_post(state, body).await
    } else if method == Method::GET {
        handle_stream(state).into_response()
    } else if method == Method::DELETE {
        debug!("client ended MCP session");
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, POST, DELETE")],
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct MethodPeek {
    method: String,
}

async fn handle_post(state: AppState, body: String) -> Response {
    // Cancelled when the request completes or axum drops it on disconnect
    let request_token = state.shutdown.child_token();
    let _cancel_on_drop = request_token.clone().drop_guard();

    let is_initialize = serde_json::from_str::<MethodPeek>(&body)
        .map(|peek| peek.method == "initialize")
        .unwrap_or(false);

    let Some(response) = state.server.handle_message(&body, &request_token).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let assign_session = is_initialize && response.is_success();
    let mut http_response = Json(response).into_response();

    if assign_session {
        let session_id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            http_response.headers_mut().insert(SESSION_HEADER, value);
        }
        info!(session = %session_id, "assigned MCP session");
    }

    http_response
}

/// Decrements the open-stream gauge when the stream is dropped
struct StreamGuard(Option<Arc<Metrics>>);

impl StreamGuard {
    fn open(metrics: Option<Arc<Metrics>>) -> Self {
        if let Some(metrics) = &metrics {
            metrics.sse_stream_opened();
        }
        Self(metrics)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(metrics) = &self.0 {
            metrics.sse_stream_closed();
        }
    }
}

fn handle_stream(
    state: AppState,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    debug!("client opened event stream");
    let guard = StreamGuard::open(state.server.metrics().cloned());

    // No server-initiated messages: the stream only carries keep-alives
    let events = stream::pending::<Result<Event, Infallible>>()
        .take_until(state.shutdown.cancelled_owned())
        .map(move |event| {
            let _guard = &guard;
            event
        });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.heartbeat))
}
