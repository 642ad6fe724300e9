use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::JsonRpcError;

/// Hard failures of the channel or the process.
///
/// A tool that reports it could not perform an action is *not* an error
/// here; it comes back as a [`ToolResult`](crate::ToolResult) with
/// `success == false`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server executable not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("connection to server is closed")]
    ConnectionClosed,

    #[error("failed to write request: {0}")]
    WriteFailure(#[source] std::io::Error),

    #[error("timeout after {timeout:?} waiting for response to {method}")]
    Timeout { method: String, timeout: Duration },

    #[error("initialize handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("{method} failed: {error}")]
    Remote { method: String, error: JsonRpcError },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
