//! Property-Based Tests for the MCP dispatcher
//!
//! - Arbitrary input never panics the dispatcher and always yields a
//!   well-formed JSON-RPC envelope
//! - Response ids echo request ids
//! - Notifications are never answered

use proptest::prelude::*;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::mcp::protocol::{McpRequest, JSONRPC_VERSION};
use crate::mcp::server::McpServer;
use crate::tools::ToolRegistry;

fn server() -> McpServer {
    McpServer::new("proptest", "0.0.0", ToolRegistry::new())
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn arb_id() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9-]{1,16}".prop_map(Value::String),
    ]
}

fn arb_method() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("initialize".to_string()),
        Just("ping".to_string()),
        Just("tools/list".to_string()),
        Just("tools/call".to_string()),
        Just("resources/list".to_string()),
        Just("prompts/list".to_string()),
        "[a-z/]{1,20}",
    ]
}

proptest! {
    #[test]
    fn prop_arbitrary_input_never_panics(raw in ".{0,256}") {
        let resp = block_on(server().handle_message(&raw, &CancellationToken::new()));
        if let Some(resp) = resp {
            prop_assert_eq!(resp.jsonrpc.as_str(), JSONRPC_VERSION);
            prop_assert!(resp.result.is_some() != resp.error.is_some());
        }
    }

    #[test]
    fn prop_response_id_matches_request(id in arb_id(), method in arb_method()) {
        let request = McpRequest::new(id.clone(), method, None);
        let resp = block_on(server().handle(request, &CancellationToken::new()));

        let resp = resp.expect("requests with an id are always answered");
        prop_assert_eq!(resp.id, id);
    }

    #[test]
    fn prop_notifications_never_answered(method in arb_method()) {
        let request = McpRequest::notification(method, Some(json!({})));
        let resp = block_on(server().handle(request, &CancellationToken::new()));
        prop_assert!(resp.is_none());
    }
}
