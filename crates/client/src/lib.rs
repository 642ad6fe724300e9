//! `tp-client`: drive a tool server over line-delimited JSON-RPC on stdio.
//!
//! This crate provides:
//! - JSON-RPC 2.0 envelope types and the MCP payloads used by the client.
//! - A process supervisor that spawns the server and shuts it down with
//!   escalation (close stdin, SIGTERM, SIGKILL).
//! - An RPC channel with a single reader task and id-based correlation.
//! - [`McpClient`], which ties the two together behind the `initialize`
//!   handshake and projects `tools/call` responses into [`ToolResult`]s.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tp_client::{ClientConfig, McpClient};
//!
//! let client = McpClient::new(ClientConfig::new("./computer-use-server"));
//! client.start().await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let result = client.call_tool("mouse_get_position", None).await?;
//! println!("{:?}", result.structured());
//!
//! client.stop().await;
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod error;
pub mod protocol;
pub mod supervisor;

// Re-exports for convenience.
pub use client::McpClient;
pub use config::{ClientConfig, ShutdownConfig};
pub use content::{ImageContent, ToolContent, ToolResult};
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use error::{ClientError, Result};
pub use protocol::{InitializeResult, JsonRpcError, JsonRpcResponse, ServerInfo, ToolDef};
