pub mod hints;
pub mod pool;

pub use hints::{ListExpansionHint, RuntimeHints};
pub use pool::{McpClientPool, call_tool_request};

use std::time::Instant;

use rmcp::model::RawContent;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::errors::{BrokerError, BrokerResult};
use crate::executor::{ExecResult, ExecutorContext, clean_args, summarize_error};
use crate::model::Operation;

/// Fold an MCP `callTool` content array into a single JSON body: text
/// blocks are concatenated and parsed as JSON when possible;
/// image/audio/other blocks become text placeholders mixed into the same
/// stream, matching how a human-readable tool transcript would render them.
fn fold_content(content: &[rmcp::model::Annotated<RawContent>]) -> Value {
    let mut text = String::new();
    for block in content {
        if !text.is_empty() {
            text.push('\n');
        }
        match &block.raw {
            RawContent::Text(t) => text.push_str(&t.text),
            RawContent::Image(img) => text.push_str(&format!("[image: {} ({} bytes)]", img.mime_type, img.data.len())),
            RawContent::Audio(audio) => text.push_str(&format!("[audio: {} ({} bytes)]", audio.mime_type, audio.data.len())),
            _ => text.push_str("[unsupported MCP content type]"),
        }
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
        _ => json!({ "text": text }),
    }
}

/// MCP branch of the Executor, dispatched through the MCP client pool.
/// `hints` comes from the Source's `templateRef` lookup,
/// which callers perform themselves — this function only applies them.
/// Returns the dispatch result plus an optional thin-result warning the
/// caller should log and fold into the next system prompt alongside
/// `hints.llm_guidance`.
pub async fn dispatch_mcp(
    pool: &McpClientPool,
    op: &Operation,
    args: Value,
    ctx: &ExecutorContext<'_>,
    hints: Option<&RuntimeHints>,
) -> BrokerResult<(ExecResult, Option<String>)> {
    let start = Instant::now();
    let tool_name = op
        .mcp_tool_name
        .as_deref()
        .unwrap_or(op.path.as_str());

    let cleaned = clean_args(&args);
    let cleaned = match hints {
        Some(h) => h.pre_process_args(tool_name, cleaned),
        None => cleaned,
    };

    let peer = pool.get_or_connect(ctx.source, ctx.credential).await?;
    let request = call_tool_request(tool_name, cleaned);

    let result = peer
        .call_tool(request)
        .await
        .map_err(|e| BrokerError::UpstreamTransport(format!("MCP call '{tool_name}' failed: {e}")))?;

    let duration_ms = start.elapsed().as_millis() as u64;
    let is_error = result.is_error.unwrap_or(false);
    let body = fold_content(&result.content);

    let (body, warning) = match hints {
        Some(h) => h.post_process_result(body),
        None => (body, None),
    };

    let url = format!("mcp://{}/{}", ctx.source.display_name, tool_name);
    let status: u16 = if is_error { 502 } else { 200 };

    let error_message = if is_error {
        warn!(tool = tool_name, source = %ctx.source.display_name, duration_ms, "mcp dispatch failed");
        Some(summarize_error(status, &body.to_string()))
    } else {
        info!(tool = tool_name, source = %ctx.source.display_name, duration_ms, "mcp dispatch ok");
        None
    };
    if let Some(warning) = &warning {
        warn!(tool = tool_name, "{warning}");
    }

    Ok((
        ExecResult {
            url,
            status,
            body,
            duration_ms,
            error_message,
        },
        warning,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::{Annotated, RawTextContent};

    fn text_block(s: &str) -> Annotated<RawContent> {
        Annotated {
            raw: RawContent::Text(RawTextContent { text: s.to_string(), meta: None }),
            annotations: None,
        }
    }

    #[test]
    fn concatenates_plain_text_blocks() {
        let content = vec![text_block("hello"), text_block("world")];
        let body = fold_content(&content);
        assert_eq!(body, json!({"text": "hello\nworld"}));
    }

    #[test]
    fn parses_json_looking_text_into_structured_data() {
        let content = vec![text_block(r#"{"id": "cus_1", "name": "Ada"}"#)];
        let body = fold_content(&content);
        assert_eq!(body["id"], json!("cus_1"));
    }

    #[test]
    fn parses_json_array_text() {
        let content = vec![text_block(r#"[{"id": "a"}, {"id": "b"}]"#)];
        let body = fold_content(&content);
        assert!(body.is_array());
    }
}
