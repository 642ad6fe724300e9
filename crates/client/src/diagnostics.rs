//! Observable leniency.
//!
//! The reader drops malformed lines and the supervisor discards stderr so a
//! noisy server cannot break the channel. A [`DiagnosticSink`] lets callers
//! see what was dropped.

use std::sync::Arc;

use serde_json::Value;

/// Something the client tolerated instead of failing on.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An inbound line that did not parse as a JSON object.
    MalformedLine { line: String, error: String },
    /// A line the server wrote to stderr.
    Stderr(String),
    /// A notification or server-initiated request.
    ServerMessage {
        method: String,
        id: Option<u64>,
        params: Option<Value>,
    },
    /// A response nobody was waiting for (late reply after a timeout, or an
    /// id this client never issued).
    UnmatchedResponse { id: u64 },
}

/// Receiver for [`Diagnostic`] events. Called from the reader task, so
/// implementations must not block.
pub trait DiagnosticSink: Send + Sync {
    fn on_diagnostic(&self, diagnostic: Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(Diagnostic) + Send + Sync,
{
    fn on_diagnostic(&self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Deliver to the sink if there is one; always trace at debug.
pub(crate) fn report(sink: Option<&SharedSink>, diagnostic: Diagnostic) {
    match &diagnostic {
        Diagnostic::MalformedLine { line, error } => {
            tracing::debug!(
                line = %line,
                error = %error,
                "skipping non-JSON line from server stdout"
            );
        }
        Diagnostic::Stderr(line) => {
            tracing::trace!(line = %line, "server stderr");
        }
        Diagnostic::ServerMessage { method, id, .. } => {
            tracing::debug!(method = %method, ?id, "ignoring server-initiated message");
        }
        Diagnostic::UnmatchedResponse { id } => {
            tracing::debug!(id, "dropping response with no pending request");
        }
    }
    if let Some(sink) = sink {
        sink.on_diagnostic(diagnostic);
    }
}
