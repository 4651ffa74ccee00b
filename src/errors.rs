//! Structured Tool Errors
//!
//! [`ToolError`] enriches a root cause with the operation that failed, the
//! component it failed in, whether a retry can help, a stable error code,
//! remediation suggestions and free-form context. It renders to the markdown
//! payload returned to MCP clients.
//!
//! Enrichment methods consume the error, so all enrichment happens before the
//! error is first rendered or logged.

use crate::mcp::protocol::ToolResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const SECURITY_ERROR: &str = "SECURITY_ERROR";
pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
pub const COMMAND_ERROR: &str = "COMMAND_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A structured error with context and recovery suggestions
#[derive(Debug, Serialize, thiserror::Error)]
#[error("[{component}] {operation} failed: {cause}")]
pub struct ToolError {
    operation: String,
    #[serde(serialize_with = "serialize_cause")]
    #[source]
    cause: BoxError,
    suggestions: Vec<String>,
    is_retryable: bool,
    timestamp: DateTime<Utc>,
    error_code: String,
    component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_name: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    context: HashMap<String, serde_json::Value>,
}

fn serialize_cause<S: Serializer>(cause: &BoxError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&cause.to_string())
}

impl ToolError {
    /// Create a bare error: code `UNKNOWN`, not retryable, no suggestions
    pub fn new(
        component: impl Into<String>,
        operation: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self {
            operation: operation.into(),
            cause: cause.into(),
            suggestions: Vec::new(),
            is_retryable: false,
            timestamp: Utc::now(),
            error_code: UNKNOWN_ERROR.to_string(),
            component: component.into(),
            resource_type: None,
            resource_name: None,
            context: HashMap::new(),
        }
    }

    /// Invalid caller input
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new("Validation", format!("validate {}", field), message)
            .with_suggestions([
                "Check the input format",
                "Refer to the documentation for valid values",
                "Verify the parameter requirements",
            ])
            .with_retryable(false)
            .with_error_code(VALIDATION_ERROR)
    }

    /// Rejected untrusted input
    pub fn security(operation: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new("Security", operation, cause)
            .with_suggestions([
                "Review the input for potentially dangerous content",
                "Use only trusted input sources",
                "Contact security team if needed",
            ])
            .with_retryable(false)
            .with_error_code(SECURITY_ERROR)
    }

    /// Deadline exceeded
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        let cause = format!("operation timed out after {:?}", timeout);
        Self::new("Timeout", operation, cause)
            .with_suggestions([
                "Try the operation again",
                "Check network connectivity",
                "Increase timeout if possible",
            ])
            .with_retryable(true)
            .with_error_code(TIMEOUT_ERROR)
    }

    /// External command failed
    pub fn command(command: &str, cause: impl Into<BoxError>) -> Self {
        Self::new("Command", format!("execute {}", command), cause)
            .with_suggestions([
                "Check if the command exists in PATH",
                "Verify command syntax and arguments",
                "Check system permissions",
            ])
            .with_retryable(true)
            .with_error_code(COMMAND_ERROR)
    }

    /// Append suggestions, keeping their order
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.is_retryable = retryable;
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = code.into();
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn context(&self) -> &HashMap<String, serde_json::Value> {
        &self.context
    }

    pub fn resource(&self) -> (Option<&str>, Option<&str>) {
        (self.resource_type.as_deref(), self.resource_name.as_deref())
    }

    /// Text of the root cause
    pub fn cause_message(&self) -> String {
        self.cause.to_string()
    }

    /// Render the error as the markdown report sent to MCP clients
    pub fn render(&self) -> String {
        let mut message = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(message, "❌ **{} Error**\n", self.component);
        let _ = writeln!(message, "**Operation**: {}", self.operation);
        let _ = writeln!(message, "**Error**: {}", self.cause);

        if let Some(resource_type) = &self.resource_type {
            let _ = writeln!(message, "**Resource Type**: {}", resource_type);
        }
        if let Some(resource_name) = &self.resource_name {
            let _ = writeln!(message, "**Resource Name**: {}", resource_name);
        }

        let _ = writeln!(message, "**Error Code**: {}", self.error_code);
        let _ = writeln!(
            message,
            "**Timestamp**: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let _ = writeln!(
            message,
            "**Retryable**: {}",
            if self.is_retryable { "Yes" } else { "No" }
        );

        if !self.suggestions.is_empty() {
            message.push_str("\n**💡 Suggestions**:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                let _ = writeln!(message, "{}. {}", i + 1, suggestion);
            }
        }

        if !self.context.is_empty() {
            message.push_str("\n**📋 Context**:\n");
            for (key, value) in &self.context {
                match value {
                    serde_json::Value::String(s) => {
                        let _ = writeln!(message, "- {}: {}", key, s);
                    }
                    other => {
                        let _ = writeln!(message, "- {}: {}", key, other);
                    }
                }
            }
        }

        message
    }

    /// Wrap the rendered report in an MCP error result
    pub fn to_tool_result(&self) -> ToolResult {
        ToolResult::error(self.render())
    }

    /// Emit the error as a structured log event
    pub fn log(&self) {
        tracing::error!(
            component = %self.component,
            operation = %self.operation,
            error_code = %self.error_code,
            retryable = self.is_retryable,
            cause = %self.cause,
            "tool operation failed"
        );
    }
}
