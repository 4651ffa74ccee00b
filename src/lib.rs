//! Kyverno Tool Server Library
//!
//! An MCP server that exposes Kyverno CLI operations as tools. Requests come
//! in over stdio or HTTP, are dispatched to a tool handler, and run as an
//! external process through a [`shell::ShellExecutor`].

pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod security;
pub mod server;
pub mod shell;
pub mod tools;

/// Name advertised in `serverInfo`
pub const SERVER_NAME: &str = "kyverno-tool-server";

/// Version advertised in `serverInfo`
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
