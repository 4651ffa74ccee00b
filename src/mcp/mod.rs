//! MCP (Model Context Protocol) Server Implementation
//!
//! The server speaks JSON-RPC 2.0 and exposes the registered tools to an
//! agent over one of two transports (see [`crate::server`]).
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Dispatch Layer** (`server`): method routing and tool invocation

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Dispatch layer: request routing
pub mod server;

pub use protocol::{
    McpError, McpMethod, McpRequest, McpResponse, ServerInfo, Tool, ToolCallParams, ToolContent,
    ToolResult,
};
pub use server::McpServer;

// Property-based tests module
#[cfg(test)]
mod proptests;
