//! Subcommand bodies. Results go to stdout, logs to stderr.

use tp_client::{McpClient, ToolContent, ToolResult};

use crate::cli::parse_json_arg;

pub async fn list(client: &McpClient, json: bool) -> anyhow::Result<()> {
    let tools = client.list_tools().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }
    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in &tools {
        println!("{:width$}  {}", tool.name, tool.description);
    }
    Ok(())
}

/// Returns whether the tool succeeded.
pub async fn call(
    client: &McpClient,
    tool: &str,
    args: Option<&str>,
    raw: bool,
) -> anyhow::Result<bool> {
    let arguments = parse_json_arg("args", args)?;
    let resp = client.call_tool_raw(tool, arguments).await?;
    let result = ToolResult::from_response(resp);
    if raw {
        println!("{}", serde_json::to_string_pretty(&result.raw)?);
        return Ok(result.success);
    }

    if !result.success {
        eprintln!(
            "error: {}",
            result.error_message().unwrap_or_else(|| "tool failed".into())
        );
    }
    for item in &result.content {
        println!("{}", render(item)?);
    }
    Ok(result.success)
}

pub async fn request(client: &McpClient, method: &str, params: Option<&str>) -> anyhow::Result<()> {
    let params = parse_json_arg("params", params)?;
    let resp = client.request(method, params).await?;
    println!("{}", serde_json::to_string_pretty(&resp.raw)?);
    Ok(())
}

fn render(item: &ToolContent) -> anyhow::Result<String> {
    Ok(match item {
        ToolContent::Structured(value) => serde_json::to_string_pretty(value)?,
        ToolContent::Text(text) => text.clone(),
        ToolContent::Image(img) => {
            format!("<{} image, {} base64 chars>", img.mime_type, img.data.len())
        }
        ToolContent::Other(value) => serde_json::to_string(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_client::ImageContent;

    #[test]
    fn renders_each_content_kind() {
        assert_eq!(
            render(&ToolContent::Structured(serde_json::json!({ "exists": true }))).unwrap(),
            "{\n  \"exists\": true\n}"
        );
        assert_eq!(render(&ToolContent::Text("ok".into())).unwrap(), "ok");
        let img = ToolContent::Image(ImageContent {
            data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        });
        assert_eq!(render(&img).unwrap(), "<image/png image, 8 base64 chars>");
        let other: serde_json::Value = serde_json::json!({ "type": "resource" });
        assert_eq!(render(&ToolContent::Other(other)).unwrap(), r#"{"type":"resource"}"#);
    }
}
