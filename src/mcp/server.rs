//! MCP Server Dispatcher
//!
//! Routes JSON-RPC requests to the tool registry. The dispatcher is shared by
//! both transports: the stdio loop and the HTTP handler feed it raw messages
//! and write back whatever it returns.

use crate::mcp::protocol::{
    McpError, McpMethod, McpRequest, McpResponse, ServerInfo, ToolCallParams, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::metrics::Metrics;
use crate::tools::ToolRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Server-side MCP endpoint
#[derive(Debug, Clone)]
pub struct McpServer {
    info: ServerInfo,
    tools: ToolRegistry,
    metrics: Option<Arc<Metrics>>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>, tools: ToolRegistry) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            tools,
            metrics: None,
        }
    }

    /// Record request and tool call metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Handle one raw JSON message
    ///
    /// Returns `None` for notifications, which must not be answered.
    pub async fn handle_message(&self, raw: &str, cancel: &CancellationToken) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "received malformed JSON-RPC message");
                return Some(McpResponse::err(
                    Value::Null,
                    McpError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(McpResponse::err(
                    id,
                    McpError::invalid_request(format!("Invalid request: {}", e)),
                ));
            }
        };

        self.handle(request, cancel).await
    }

    /// Handle one parsed request
    pub async fn handle(&self, request: McpRequest, cancel: &CancellationToken) -> Option<McpResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return request.id.map(|id| {
                McpResponse::err(
                    id,
                    McpError::invalid_request(format!(
                        "Unsupported jsonrpc version: {}",
                        request.jsonrpc
                    )),
                )
            });
        }

        let method = McpMethod::from(request.method.as_str());
        if let Some(metrics) = &self.metrics {
            metrics.record_rpc_request(method.metric_label());
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "received notification");
            return None;
        };

        let outcome = match method {
            McpMethod::Initialize => Ok(self.initialize_result()),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(json!({ "tools": self.tools.definitions() })),
            McpMethod::ToolsCall => self.call_tool(request.params, cancel).await,
            McpMethod::ResourcesList => Ok(json!({ "resources": [] })),
            McpMethod::PromptsList => Ok(json!({ "prompts": [] })),
            _ => Err(McpError::method_not_found(&request.method)),
        };

        Some(match outcome {
            Ok(result) => McpResponse::ok(id, result),
            Err(error) => McpResponse::err(id, error),
        })
    }

    fn initialize_result(&self) -> Value {
        info!(server = %self.info.name, "client initialized session");
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": self.info,
        })
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::invalid_params("Missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| McpError::invalid_params(format!("Invalid params: {}", e)))
            })?;

        let handler = self
            .tools
            .get(&params.name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        let start = Instant::now();
        let result = handler.call(&params.arguments, cancel).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_tool_call(&params.name, result.is_error(), start.elapsed());
        }

        serde_json::to_value(result)
            .map_err(|e| McpError::internal_error(format!("Failed to encode tool result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{Tool, ToolResult};
    use crate::tools::ToolHandler;
    use async_trait::async_trait;

    struct UpperTool;

    #[async_trait]
    impl ToolHandler for UpperTool {
        fn definition(&self) -> Tool {
            Tool {
                name: "upper".to_string(),
                description: "Uppercase text".to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: &Value, _cancel: &CancellationToken) -> ToolResult {
            match arguments.get("text").and_then(Value::as_str) {
                Some(text) => ToolResult::text(text.to_uppercase()),
                None => ToolResult::error("text not specified"),
            }
        }
    }

    fn server() -> McpServer {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(UpperTool));
        McpServer::new("test-server", "1.2.3", tools)
    }

    async fn send(server: &McpServer, raw: &str) -> Option<McpResponse> {
        server.handle_message(raw, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_initialize() {
        let resp = send(&server(), r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "test-server");
        assert_eq!(result["serverInfo"]["version"], "1.2.3");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let resp = send(&server(), r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_ping_and_lists() {
        let srv = server();
        let resp = send(&srv, r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#).await.unwrap();
        assert_eq!(resp.id, json!("a"));
        assert_eq!(resp.result, Some(json!({})));

        let resp = send(&srv, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await.unwrap();
        let tools = &resp.result.unwrap()["tools"];
        assert_eq!(tools[0]["name"], "upper");
        assert!(tools[0]["inputSchema"].is_object());

        let resp = send(&srv, r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#).await.unwrap();
        assert_eq!(resp.result.unwrap()["resources"], json!([]));
    }

    #[tokio::test]
    async fn test_tools_call() {
        let resp = send(
            &server(),
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"upper","arguments":{"text":"abc"}}}"#,
        )
        .await
        .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["text"], "ABC");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_error_result_is_not_rpc_error() {
        let resp = send(
            &server(),
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"upper","arguments":{}}}"#,
        )
        .await
        .unwrap();

        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["isError"], true);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let resp = send(
            &server(),
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"nope"}}"#,
        )
        .await
        .unwrap();

        let error = resp.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let resp = send(&server(), r#"{"jsonrpc":"2.0","id":10,"method":"tools/call"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = send(&server(), r#"{"jsonrpc":"2.0","id":11,"method":"sampling/createMessage"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let resp = send(&server(), "{not json").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let resp = send(&server(), r#"{"jsonrpc":"2.0","id":12}"#).await.unwrap();
        assert_eq!(resp.id, json!(12));
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let resp = send(&server(), r#"{"jsonrpc":"1.0","id":13,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let srv = server().with_metrics(metrics.clone());

        send(
            &srv,
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"upper","arguments":{"text":"x"}}}"#,
        )
        .await;

        let text = metrics.gather().unwrap();
        assert!(text.contains("mcp_rpc_requests_total{method=\"tools/call\"} 1"));
        assert!(text.contains("status=\"success\",tool_name=\"upper\""));
    }

    #[tokio::test]
    async fn test_unknown_methods_share_one_metric_series() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let srv = server().with_metrics(metrics.clone());

        for i in 0..100 {
            let raw = format!(r#"{{"jsonrpc":"2.0","id":{},"method":"junk/{}"}}"#, i, i);
            send(&srv, &raw).await;
        }
        // Rejected before dispatch, so not counted
        send(&srv, r#"{"jsonrpc":"1.0","id":1,"method":"junk/x"}"#).await;

        let text = metrics.gather().unwrap();
        let series = text
            .lines()
            .filter(|line| line.starts_with("mcp_rpc_requests_total{"))
            .count();
        assert_eq!(series, 1);
        assert!(text.contains("mcp_rpc_requests_total{method=\"other\"} 100"));
        assert!(!text.contains("junk"));
    }
}
