//! Caller-facing projection of a `tools/call` response.

use base64::Engine as _;
use serde_json::Value;

use crate::protocol::{JsonRpcError, JsonRpcResponse};

const DEFAULT_IMAGE_MIME: &str = "image/png";

/// One decoded content item.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    /// A text item whose body parsed as JSON.
    Structured(Value),
    /// A text item that is not JSON.
    Text(String),
    Image(ImageContent),
    /// Any other item type, kept as received.
    Other(Value),
}

/// Base64 image payload, opaque to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
}

impl ImageContent {
    /// Decode the base64 payload into raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.data.trim())
    }
}

/// Outcome of a tool invocation.
///
/// `success == false` means the remote tool reported a failure, either as a
/// JSON-RPC `error` member or as a result flagged `isError`. The channel
/// itself worked.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub content: Vec<ToolContent>,
    pub error: Option<Value>,
    /// The full response envelope.
    pub raw: Value,
}

impl ToolResult {
    pub fn from_response(resp: JsonRpcResponse) -> Self {
        if let Some(error) = resp.error {
            return Self {
                success: false,
                content: Vec::new(),
                error: Some(error),
                raw: resp.raw,
            };
        }

        let result = resp.result.unwrap_or(Value::Null);
        let content: Vec<ToolContent> = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(project_item).collect())
            .unwrap_or_default();

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let error = is_error.then(|| Value::String(joined_text(&content)));

        Self {
            success: !is_error,
            content,
            error,
            raw: resp.raw,
        }
    }

    /// The only content item, when there is exactly one.
    pub fn single(&self) -> Option<&ToolContent> {
        match self.content.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// First item that parsed as JSON.
    pub fn structured(&self) -> Option<&Value> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Structured(v) => Some(v),
            _ => None,
        })
    }

    /// First plain-text item.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// First image item.
    pub fn image(&self) -> Option<&ImageContent> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Image(img) => Some(img),
            _ => None,
        })
    }

    /// Human-readable failure description.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            Value::String(s) => s.clone(),
            other => JsonRpcError::from_value(other.clone()).to_string(),
        })
    }
}

fn project_item(item: &Value) -> ToolContent {
    match item.get("type").and_then(Value::as_str) {
        Some("text") => {
            let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
            match serde_json::from_str::<Value>(text) {
                Ok(parsed) => ToolContent::Structured(parsed),
                Err(_) => ToolContent::Text(text.to_string()),
            }
        }
        Some("image") => ToolContent::Image(ImageContent {
            data: item
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            mime_type: item
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_IMAGE_MIME)
                .to_string(),
        }),
        _ => ToolContent::Other(item.clone()),
    }
}

fn joined_text(content: &[ToolContent]) -> String {
    content
        .iter()
        .map(|c| match c {
            ToolContent::Text(t) => t.clone(),
            ToolContent::Structured(Value::String(s)) => s.clone(),
            ToolContent::Structured(v) | ToolContent::Other(v) => v.to_string(),
            ToolContent::Image(img) => format!("<{} image>", img.mime_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(raw: Value) -> JsonRpcResponse {
        JsonRpcResponse {
            id: raw["id"].as_u64().unwrap_or(0),
            result: raw.get("result").cloned(),
            error: raw.get("error").cloned(),
            raw,
        }
    }

    #[test]
    fn text_json_is_parsed() {
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": { "content": [{ "type": "text", "text": "{\"x\":10,\"y\":20}" }] }
        })));
        assert!(result.success);
        assert_eq!(result.structured(), Some(&json!({"x": 10, "y": 20})));
        assert_eq!(result.single(), Some(&ToolContent::Structured(json!({"x": 10, "y": 20}))));
        assert!(result.error.is_none());
    }

    #[test]
    fn plain_text_falls_back_to_raw() {
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": { "content": [{ "type": "text", "text": "Moved mouse to 10,20" }] }
        })));
        assert_eq!(result.text(), Some("Moved mouse to 10,20"));
        assert!(result.structured().is_none());
    }

    #[test]
    fn image_defaults_mime_type() {
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": { "content": [
                { "type": "image", "data": "aGVsbG8=" },
                { "type": "text", "text": "captured" }
            ] }
        })));
        let img = result.image().unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.decode().unwrap(), b"hello");
        assert!(result.single().is_none());
        assert_eq!(result.content.len(), 2);
    }

    #[test]
    fn rpc_error_is_failed_result() {
        let raw = json!({
            "jsonrpc": "2.0", "id": 4,
            "error": { "code": -32602, "message": "missing required argument: key" }
        });
        let result = ToolResult::from_response(response(raw.clone()));
        assert!(!result.success);
        assert!(result.content.is_empty());
        assert_eq!(result.raw, raw);
        assert!(result
            .error_message()
            .unwrap()
            .contains("missing required argument: key"));
    }

    #[test]
    fn is_error_flag_is_failed_result() {
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 2,
            "result": {
                "content": [{ "type": "text", "text": "window not found" }],
                "isError": true
            }
        })));
        assert!(!result.success);
        assert_eq!(result.error_message().as_deref(), Some("window not found"));
        assert_eq!(result.text(), Some("window not found"));
    }

    #[test]
    fn unknown_item_kept_verbatim() {
        let item = json!({ "type": "resource", "resource": { "uri": "file:///tmp/a" } });
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 3, "result": { "content": [item.clone()] }
        })));
        assert_eq!(result.single(), Some(&ToolContent::Other(item)));
    }

    #[test]
    fn missing_content_is_empty_success() {
        let result = ToolResult::from_response(response(json!({
            "jsonrpc": "2.0", "id": 3, "result": {}
        })));
        assert!(result.success);
        assert!(result.content.is_empty());
    }
}
