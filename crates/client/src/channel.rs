//! Line-delimited JSON-RPC channel over a child's stdin/stdout.
//!
//! One writer lock serializes outbound lines. One reader task owns stdout
//! and resolves waiters through a correlation table keyed by request id, so
//! concurrent callers can never receive each other's responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::diagnostics::{self, Diagnostic, SharedSink};
use crate::error::{ClientError, Result};
use crate::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Correlation table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct PendingTable {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once the reader stops; no new waiters are accepted after that.
    closed: bool,
}

type SharedPending = Arc<Mutex<PendingTable>>;

/// Removes the waiter on drop, covering timeout, write failure and a
/// cancelled call future alike.
struct PendingGuard<'a> {
    pending: &'a SharedPending,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().waiters.remove(&self.id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How long [`RpcChannel::close`] waits for an in-flight write to finish.
const CLOSE_WAIT: Duration = Duration::from_millis(250);

pub struct RpcChannel {
    writer: tokio::sync::Mutex<Option<ChildStdin>>,
    pending: SharedPending,
    next_id: AtomicU64,
    open: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RpcChannel {
    /// Wrap the streams and start the reader task.
    pub fn new(stdin: ChildStdin, stdout: ChildStdout, sink: Option<SharedSink>) -> Self {
        let pending: SharedPending = Arc::new(Mutex::new(PendingTable::default()));
        let reader = tokio::spawn(read_loop(stdout, pending.clone(), sink));

        Self {
            writer: tokio::sync::Mutex::new(Some(stdin)),
            pending,
            next_id: AtomicU64::new(1),
            open: AtomicBool::new(true),
            reader: Mutex::new(Some(reader)),
        }
    }

    /// False after [`close`](Self::close) or once the server closed stdout.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.pending.lock().closed
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request and wait up to `timeout` for the response with the
    /// same id. The deadline covers the write as well as the wait, so a
    /// server that stops reading stdin cannot stall the caller.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        let id = self.next_request_id();
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let rx = {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(ClientError::ConnectionClosed);
            }
            let (tx, rx) = oneshot::channel();
            pending.waiters.insert(id, tx);
            rx
        };
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let deadline = Instant::now() + timeout;
        let timed_out = || ClientError::Timeout {
            method: method.to_string(),
            timeout,
        };

        tracing::debug!(id, method, "sending request");
        match tokio::time::timeout_at(deadline, self.write_line(&line)).await {
            Ok(written) => written?,
            Err(_) => {
                // A partial frame may be in the pipe; nothing after it can be parsed.
                self.open.store(false, Ordering::SeqCst);
                tracing::warn!(id, method, ?timeout, "request write timed out, channel closed");
                return Err(timed_out());
            }
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Sender dropped: the reader stopped before our response arrived.
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::warn!(id, method, ?timeout, "request timed out");
                Err(timed_out())
            }
        }
    }

    /// Send a notification. Only the write is awaited, bounded by `timeout`.
    pub async fn send_notification(&self, method: &str, timeout: Duration) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method))?;
        tracing::debug!(method, "sending notification");
        match tokio::time::timeout(timeout, self.write_line(&line)).await {
            Ok(written) => written,
            Err(_) => {
                self.open.store(false, Ordering::SeqCst);
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn write_line(&self, json: &str) -> Result<()> {
        if !self.is_open() {
            return Err(ClientError::ConnectionClosed);
        }

        let mut frame = Vec::with_capacity(json.len() + 1);
        frame.extend_from_slice(json.as_bytes());
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        let stdin = writer.as_mut().ok_or(ClientError::ConnectionClosed)?;
        let written = async {
            stdin.write_all(&frame).await?;
            stdin.flush().await
        }
        .await;

        written.map_err(write_error)
    }

    /// Stop accepting requests and hand back stdin so the caller can close
    /// it as the first step of shutdown.
    ///
    /// Returns `None` if a write is still blocked after a short wait; the
    /// caller then terminates the process, which breaks the pipe and frees
    /// the writer.
    pub async fn close(&self) -> Option<ChildStdin> {
        self.open.store(false, Ordering::SeqCst);
        match tokio::time::timeout(CLOSE_WAIT, self.writer.lock()).await {
            Ok(mut writer) => writer.take(),
            Err(_) => {
                tracing::warn!("server stdin blocked by a pending write, not waiting for it");
                None
            }
        }
    }

    /// Stop the reader and release every remaining waiter with
    /// [`ClientError::ConnectionClosed`].
    pub async fn finish(&self) {
        let reader = self.reader.lock().take();
        if let Some(mut reader) = reader {
            if tokio::time::timeout(Duration::from_millis(500), &mut reader)
                .await
                .is_err()
            {
                reader.abort();
            }
        }
        close_pending(&self.pending);
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

fn write_error(e: std::io::Error) -> ClientError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe => ClientError::ConnectionClosed,
        _ => ClientError::WriteFailure(e),
    }
}

fn close_pending(pending: &SharedPending) {
    let mut table = pending.lock();
    table.closed = true;
    // Dropping the senders wakes every waiter with a receive error.
    table.waiters.clear();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reader task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn read_loop(stdout: ChildStdout, pending: SharedPending, sink: Option<SharedSink>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::info!("server stdout closed (EOF)");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                dispatch_line(&line, &pending, sink.as_ref());
            }
            Err(e) => {
                tracing::warn!(error = %e, "error reading from server stdout");
                break;
            }
        }
    }
    close_pending(&pending);
}

fn dispatch_line(line: &str, pending: &SharedPending, sink: Option<&SharedSink>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let malformed = |error: String| Diagnostic::MalformedLine {
        line: trimmed.to_string(),
        error,
    };

    let raw: Value = match serde_json::from_str(trimmed) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => return diagnostics::report(sink, malformed("not a JSON object".into())),
        Err(e) => return diagnostics::report(sink, malformed(e.to_string())),
    };
    let msg: JsonRpcMessage = match serde_json::from_value(raw.clone()) {
        Ok(m) => m,
        Err(e) => return diagnostics::report(sink, malformed(e.to_string())),
    };

    if let Some(id) = msg.response_id() {
        let waiter = pending.lock().waiters.remove(&id);
        let delivered = match waiter {
            Some(tx) => tx.send(JsonRpcResponse::from_message(id, raw, msg)).is_ok(),
            None => false,
        };
        if delivered {
            tracing::debug!(id, "response delivered");
        } else {
            diagnostics::report(sink, Diagnostic::UnmatchedResponse { id });
        }
        return;
    }

    match msg.method {
        Some(method) => diagnostics::report(
            sink,
            Diagnostic::ServerMessage {
                method,
                id: msg.id,
                params: msg.params,
            },
        ),
        None => diagnostics::report(sink, malformed("envelope has neither id nor method".into())),
    }
}
