//! `McpClient`: one supervised tool server plus the RPC channel to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::channel::RpcChannel;
use crate::config::ClientConfig;
use crate::content::ToolResult;
use crate::diagnostics::{DiagnosticSink, SharedSink};
use crate::error::{ClientError, Result};
use crate::protocol::{
    methods, InitializeParams, InitializeResult, JsonRpcError, JsonRpcResponse, ToolCallParams,
    ToolDef, ToolsListResult,
};
use crate::supervisor::ProcessSupervisor;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A live, handshaken connection. Callers only ever see a `Connection`
/// after `notifications/initialized` has been flushed.
struct Connection {
    channel: RpcChannel,
    supervisor: tokio::sync::Mutex<ProcessSupervisor>,
    request_timeout: Duration,
    initialized: AtomicBool,
    server: InitializeResult,
}

impl Connection {
    async fn open(config: &ClientConfig, sink: Option<SharedSink>) -> Result<Self> {
        let (supervisor, streams) = ProcessSupervisor::spawn(config, sink.clone())?;
        let channel = RpcChannel::new(streams.stdin, streams.stdout, sink);

        let mut conn = Self {
            channel,
            supervisor: tokio::sync::Mutex::new(supervisor),
            request_timeout: config.request_timeout(),
            initialized: AtomicBool::new(false),
            server: InitializeResult::default(),
        };

        // The server may need a moment before it reads stdin.
        tokio::time::sleep(config.startup_delay()).await;

        match conn.handshake(config).await {
            Ok(server) => {
                conn.server = server;
                conn.initialized.store(true, Ordering::SeqCst);
                Ok(conn)
            }
            Err(e) => {
                conn.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self, config: &ClientConfig) -> Result<InitializeResult> {
        let params = serde_json::to_value(InitializeParams::from_config(config))?;

        let resp = self
            .channel
            .send_request(methods::INITIALIZE, Some(params), self.request_timeout)
            .await
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;

        if let Some(error) = resp.error {
            return Err(ClientError::HandshakeFailed(
                JsonRpcError::from_value(error).to_string(),
            ));
        }

        let server = resp
            .result
            .and_then(|v| serde_json::from_value::<InitializeResult>(v).ok())
            .unwrap_or_default();
        tracing::debug!(server = ?server.server_info, "initialize response received");

        self.channel
            .send_notification(methods::INITIALIZED, self.request_timeout)
            .await
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;

        tracing::info!(
            protocol_version = ?server.protocol_version,
            "tool server initialized"
        );
        Ok(server)
    }

    /// Fail fast instead of writing into a dead process.
    fn ensure_alive(&self) -> Result<()> {
        if !self.initialized.load(Ordering::SeqCst) || !self.channel.is_open() {
            return Err(ClientError::ConnectionClosed);
        }
        // A held lock means shutdown is in progress; the write path will
        // report the closed stream.
        if let Ok(mut supervisor) = self.supervisor.try_lock() {
            if !supervisor.is_running() {
                return Err(ClientError::ConnectionClosed);
            }
        }
        Ok(())
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        self.ensure_alive()?;
        self.channel.send_request(method, params, timeout).await
    }

    async fn is_running(&self) -> bool {
        self.supervisor.lock().await.is_running()
    }

    async fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        let stdin = self.channel.close().await;
        self.supervisor.lock().await.stop(stdin).await;
        self.channel.finish().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client for one stdio tool server.
///
/// ```rust,ignore
/// let client = McpClient::new(ClientConfig::new("./computer-use-server"));
/// client.start().await?;
/// let tools = client.list_tools().await?;
/// let info = client.call_tool("system_get_info", None).await?;
/// client.stop().await;
/// ```
///
/// Calls take `&self` and may run concurrently; `start` and `stop` are
/// serialized against each other.
pub struct McpClient {
    config: ClientConfig,
    sink: Option<SharedSink>,
    conn: parking_lot::Mutex<Option<Arc<Connection>>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl McpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sink: None,
            conn: parking_lot::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Report dropped lines, stderr output and unsolicited messages.
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Spawn the server and complete the `initialize` handshake.
    /// A no-op if already started.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.conn.lock().is_some() {
            return Ok(());
        }

        tracing::info!(command = %self.config.command.display(), "starting tool server");
        let conn = Connection::open(&self.config, self.sink.clone()).await?;
        *self.conn.lock() = Some(Arc::new(conn));
        Ok(())
    }

    /// Shut the server down. Never fails; a no-op if not started.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            tracing::info!("stopping tool server");
            conn.shutdown().await;
        }
    }

    /// True between a successful `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Whether the server process is still alive.
    pub async fn is_running(&self) -> bool {
        match self.connection() {
            Ok(conn) => conn.is_running().await,
            Err(_) => false,
        }
    }

    /// What the server reported about itself during the handshake.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.conn.lock().as_ref().map(|c| c.server.clone())
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.conn
            .lock()
            .as_ref()
            .cloned()
            .ok_or(ClientError::ConnectionClosed)
    }

    /// Send any request and return the raw response, using the configured
    /// timeout.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let timeout = self.config.request_timeout();
        self.request_with_timeout(method, params, timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        let conn = self.connection()?;
        conn.request(method, params, timeout).await
    }

    /// Enumerate the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDef>> {
        let resp = self.request(methods::TOOLS_LIST, None).await?;
        let value = resp.into_result().map_err(|error| ClientError::Remote {
            method: methods::TOOLS_LIST.into(),
            error,
        })?;
        let list: ToolsListResult = serde_json::from_value(value)?;
        Ok(list.tools)
    }

    /// Invoke a tool. Missing arguments are sent as `{}`.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<ToolResult> {
        let resp = self.call_tool_raw(name, arguments).await?;
        let result = ToolResult::from_response(resp);
        if !result.success {
            tracing::debug!(tool = name, error = ?result.error_message(), "tool reported failure");
        }
        Ok(result)
    }

    /// Invoke a tool and return the unprojected response.
    pub async fn call_tool_raw(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<JsonRpcResponse> {
        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments: arguments.unwrap_or_else(|| Value::Object(Default::default())),
        })?;
        self.request(methods::TOOLS_CALL, Some(params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_before_start_is_connection_closed() {
        let client = McpClient::new(ClientConfig::new("/nonexistent/server"));
        assert!(!client.is_started());
        assert!(!client.is_running().await);
        assert!(client.server_info().is_none());
        let err = client.call_tool("system_get_info", None).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let client = McpClient::new(ClientConfig::new("/nonexistent/server"));
        client.stop().await;
        client.stop().await;
        assert!(!client.is_started());
    }

    #[tokio::test]
    async fn start_with_missing_binary_is_not_found() {
        let client = McpClient::new(ClientConfig::new("/nonexistent/server"));
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
        assert!(!client.is_started());
    }
}
