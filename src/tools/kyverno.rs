//! Kyverno tools
//!
//! `kyverno_apply_policy` runs `kyverno apply --cluster --policy-report
//! <policy>` against the configured cluster and returns the CLI output as-is.

use super::{ToolHandler, ToolRegistry};
use crate::commands::CommandBuilder;
use crate::mcp::protocol::{Tool, ToolResult};
use crate::shell::ShellExecutor;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Name of the apply-policy tool
pub const APPLY_POLICY_TOOL: &str = "kyverno_apply_policy";

/// Settings shared by the Kyverno tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KyvernoSettings {
    /// Binary to invoke
    pub binary: String,

    /// Kubeconfig passed as `--kubeconfig` (validated by the builder)
    pub kubeconfig: Option<String>,

    /// Output format passed as `--output` (validated by the builder)
    pub output_format: Option<String>,
}

impl Default for KyvernoSettings {
    fn default() -> Self {
        Self {
            binary: crate::commands::KYVERNO_BINARY.to_string(),
            kubeconfig: None,
            output_format: None,
        }
    }
}

/// `kyverno_apply_policy` handler
pub struct KyvernoApplyPolicy {
    executor: Arc<dyn ShellExecutor>,
    settings: KyvernoSettings,
}

impl KyvernoApplyPolicy {
    pub fn new(executor: Arc<dyn ShellExecutor>, settings: KyvernoSettings) -> Self {
        Self { executor, settings }
    }

    fn command(&self, policy: &str) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.settings.binary).with_args([
            "apply",
            "--cluster",
            "--policy-report",
            policy,
        ]);

        if let Some(kubeconfig) = &self.settings.kubeconfig {
            builder = builder.with_kubeconfig(kubeconfig);
        }
        if let Some(output) = &self.settings.output_format {
            builder = builder.with_output_format(output);
        }
        builder
    }
}

#[async_trait]
impl ToolHandler for KyvernoApplyPolicy {
    fn definition(&self) -> Tool {
        Tool {
            name: APPLY_POLICY_TOOL.to_string(),
            description: "Apply a Kyverno policy to the cluster and return the policy report"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "policy": {
                        "type": "string",
                        "description": "Path or URL of the Kyverno policy to apply"
                    }
                },
                "required": ["policy"]
            }),
        }
    }

    async fn call(&self, arguments: &Value, cancel: &CancellationToken) -> ToolResult {
        let policy = arguments
            .get("policy")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if policy.is_empty() {
            return ToolResult::error("Policy not specified");
        }

        info!(tool = APPLY_POLICY_TOOL, policy = %policy, "applying kyverno policy");

        match self
            .command(policy)
            .execute(self.executor.as_ref(), cancel)
            .await
        {
            Ok(output) => ToolResult::text(output),
            Err(err) => ToolResult::error(format!(
                "Error applying kyverno policy: {}",
                err.render()
            )),
        }
    }
}

/// Register every Kyverno tool on `registry`
pub fn register_tools(
    registry: &mut ToolRegistry,
    executor: Arc<dyn ShellExecutor>,
    settings: KyvernoSettings,
) {
    registry.register(Arc::new(KyvernoApplyPolicy::new(executor, settings)));
}
