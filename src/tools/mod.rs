//! Tool Registry
//!
//! Maps MCP tool names to handlers. A handler turns the call arguments into a
//! command, runs it through the shell executor it was given and converts the
//! outcome into a [`ToolResult`].
//!
//! # Architecture
//!
//! - `mod.rs`: the [`ToolHandler`] trait and the [`ToolRegistry`]
//! - `kyverno.rs`: the `kyverno_apply_policy` tool and its settings

mod kyverno;

pub use kyverno::{register_tools, KyvernoApplyPolicy, KyvernoSettings, APPLY_POLICY_TOOL};

use crate::mcp::protocol::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A callable MCP tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Definition advertised by `tools/list`
    fn definition(&self) -> Tool;

    /// Run the tool
    ///
    /// Tool failures are returned as error results, never as protocol errors.
    async fn call(&self, arguments: &Value, cancel: &CancellationToken) -> ToolResult;
}

/// Registered tools, keyed by name
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its definition's name, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name;
        tracing::debug!(tool = %name, "registered tool");
        self.tools.insert(name, handler);
    }

    /// Definitions of all registered tools, sorted by name
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|handler| handler.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
