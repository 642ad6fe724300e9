//! Mock stdio tool server for the integration tests.
//!
//! Speaks line-delimited JSON-RPC on stdin/stdout and exposes a small set of
//! tools with in-memory state. Requires `-t stdio` like the real server.
//!
//! # Environment Variables
//!
//! - `MOCK_FAIL_INITIALIZE`: answer `initialize` with an error
//! - `MOCK_SILENT_INITIALIZE`: never answer `initialize`
//! - `MOCK_NOISE`: write non-JSON lines to stdout and chatter to stderr
//! - `MOCK_IGNORE_TERM`: ignore SIGTERM and stdin EOF (forces a kill)
//! - `MOCK_STALL`: stop reading stdin once initialized (writes back up)

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// 1x1 PNG.
const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

#[derive(Default)]
struct State {
    initialized: bool,
    clipboard: String,
}

type Shared = Arc<parking_lot::Mutex<State>>;
type Out = Arc<Mutex<tokio::io::Stdout>>;

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty() && v != "0").unwrap_or(false)
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !matches!(args.as_slice(), [flag, mode] if flag == "-t" && mode == "stdio") {
        eprintln!("mock-tool-server: expected `-t stdio`, got {args:?}");
        std::process::exit(2);
    }

    let ignore_term = env_flag("MOCK_IGNORE_TERM");
    #[cfg(unix)]
    if ignore_term {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::spawn(async move {
                while term.recv().await.is_some() {
                    eprintln!("mock-tool-server: ignoring SIGTERM");
                }
            });
        }
    }

    let out: Out = Arc::new(Mutex::new(tokio::io::stdout()));
    let state: Shared = Arc::new(parking_lot::Mutex::new(State::default()));

    if env_flag("MOCK_NOISE") {
        eprintln!("mock-tool-server: starting");
        write_raw(&out, "mock-tool-server v0 starting up\n").await;
    }

    let stall = env_flag("MOCK_STALL");
    let mut stalled = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(msg) => handle(msg, &state, &out).await,
            Err(e) => eprintln!("mock-tool-server: bad request line: {e}"),
        }
        if stall && state.lock().initialized {
            stalled = true;
            break;
        }
    }

    if stalled {
        // Hold stdin open without reading it.
        let _stdin = lines;
        std::future::pending::<()>().await;
    }

    if ignore_term {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

async fn write_raw(out: &Out, text: &str) {
    let mut out = out.lock().await;
    let _ = out.write_all(text.as_bytes()).await;
    let _ = out.flush().await;
}

async fn send(out: &Out, msg: Value) {
    write_raw(out, &format!("{msg}\n")).await;
}

async fn reply(out: &Out, id: &Value, result: Result<Value, (i64, String)>) {
    let msg = match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        }),
    };
    send(out, msg).await;
}

async fn handle(msg: Value, state: &Shared, out: &Out) {
    let method = msg.get("method").and_then(Value::as_str).unwrap_or_default();
    let id = match msg.get("id") {
        Some(id) => id.clone(),
        None => {
            if method == "notifications/initialized" {
                state.lock().initialized = true;
                if env_flag("MOCK_NOISE") {
                    send(
                        out,
                        json!({
                            "jsonrpc": "2.0",
                            "method": "notifications/message",
                            "params": { "level": "info", "data": "ready" }
                        }),
                    )
                    .await;
                }
            }
            return;
        }
    };
    let params = msg.get("params").cloned().unwrap_or(Value::Null);

    match method {
        "initialize" => {
            if env_flag("MOCK_SILENT_INITIALIZE") {
                return;
            }
            if env_flag("MOCK_FAIL_INITIALIZE") {
                return reply(out, &id, Err((-32600, "initialization refused".into()))).await;
            }
            let result = json!({
                "protocolVersion": params
                    .get("protocolVersion")
                    .cloned()
                    .unwrap_or_else(|| json!("2024-11-05")),
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "mock-tool-server", "version": env!("CARGO_PKG_VERSION") }
            });
            reply(out, &id, Ok(result)).await;
        }
        "ping" => reply(out, &id, Ok(json!({}))).await,
        "debug/exit" => std::process::exit(3),
        "debug/noise" => {
            write_raw(out, "this line is not JSON\n").await;
            send(out, json!({ "jsonrpc": "2.0", "id": 999_999, "result": {} })).await;
            reply(out, &id, Ok(json!({ "noisy": true }))).await;
        }
        "tools/list" | "tools/call" if !state.lock().initialized => {
            reply(out, &id, Err((-32002, "server not initialized".into()))).await;
        }
        "tools/list" => reply(out, &id, Ok(json!({ "tools": tool_defs() }))).await,
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            if name == "util_sleep" {
                // Reply later so other requests can overtake this one.
                let out = out.clone();
                tokio::spawn(async move {
                    let result = match required_u64(&args, "milliseconds") {
                        Ok(ms) => {
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                            Ok(text_result(json!({ "slept_ms": ms })))
                        }
                        Err(e) => Err(e),
                    };
                    reply(&out, &id, result).await;
                });
                return;
            }
            let result = call_tool(name, &args, state);
            reply(out, &id, result).await;
        }
        other => reply(out, &id, Err((-32601, format!("method not found: {other}")))).await,
    }
}

fn tool_defs() -> Value {
    json!([
        tool("system_get_info", "Get system information", None),
        tool("clipboard_read", "Read text from clipboard", None),
        tool("clipboard_write", "Write text to clipboard", Some(("text", "string"))),
        tool("key_tap", "Tap a key", Some(("key", "string"))),
        tool("process_exists", "Check if process exists", Some(("pid", "number"))),
        tool("screen_capture", "Capture screenshot (returns base64 PNG)", None),
        tool(
            "util_sleep",
            "Sleep/pause for specified milliseconds",
            Some(("milliseconds", "number")),
        ),
        tool("echo", "Echo the arguments back as text", None),
    ])
}

/// A tool definition with at most one required parameter.
fn tool(name: &str, description: &str, required: Option<(&str, &str)>) -> Value {
    let schema = match required {
        Some((param, ty)) => json!({
            "type": "object",
            "properties": { param: { "type": ty } },
            "required": [param]
        }),
        None => json!({ "type": "object", "properties": {} }),
    };
    json!({ "name": name, "description": description, "inputSchema": schema })
}

fn text_result(body: Value) -> Value {
    json!({ "content": [{ "type": "text", "text": body.to_string() }] })
}

fn missing(key: &str) -> (i64, String) {
    (-32603, format!("required parameter '{key}' is missing"))
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, (i64, String)> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| missing(key))
}

fn required_u64(args: &Value, key: &str) -> Result<u64, (i64, String)> {
    args.get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .ok_or_else(|| missing(key))
}

fn call_tool(name: &str, args: &Value, state: &Shared) -> Result<Value, (i64, String)> {
    match name {
        "system_get_info" => Ok(text_result(json!({
            "version": format!("mock {}", std::env::consts::OS),
            "is_64bit": cfg!(target_pointer_width = "64"),
            "main_display_id": 0,
            "displays_count": 1
        }))),
        "clipboard_read" => {
            let text = state.lock().clipboard.clone();
            // Plain text, like the real server.
            Ok(json!({ "content": [{ "type": "text", "text": text }] }))
        }
        "clipboard_write" => {
            let text = required_str(args, "text")?;
            state.lock().clipboard = text.to_string();
            Ok(text_result(json!({ "success": true, "message": "Text written to clipboard" })))
        }
        "key_tap" => {
            let key = required_str(args, "key")?;
            if key.chars().count() != 1 && !matches!(key, "enter" | "tab" | "escape" | "space") {
                return Ok(json!({
                    "content": [{ "type": "text", "text": format!("unknown key: {key}") }],
                    "isError": true
                }));
            }
            Ok(text_result(json!({ "success": true, "key": key })))
        }
        "process_exists" => {
            let pid = required_u64(args, "pid")?;
            Ok(text_result(json!({ "exists": pid_exists(pid) })))
        }
        "screen_capture" => Ok(json!({
            "content": [{ "type": "image", "data": PIXEL_PNG_BASE64, "mimeType": "image/png" }]
        })),
        "echo" => Ok(text_result(args.clone())),
        other => Err((-32602, format!("tool '{other}' not found"))),
    }
}

fn pid_exists(pid: u64) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        match i32::try_from(pid) {
            Ok(raw) => match kill(Pid::from_raw(raw), None) {
                Ok(()) => true,
                Err(nix::errno::Errno::EPERM) => true,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
