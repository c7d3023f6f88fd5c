use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::ProviderConfig;

/// A chat message in the wire format the configured LLM provider expects
/// (OpenAI-compatible `/chat/completions`). The provider itself is an
/// external collaborator — this type only carries what the
/// broker needs to mediate its streaming output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into(), ..Default::default() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into(), ..Default::default() }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A candidate Operation offered to the model this Turn, in the
/// `{name, description, parameters}` shape every OpenAI-compatible
/// provider expects for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Thin client for the single configured LLM provider — the configured
/// language model the Turn plans its response with. One-shot
/// request/response rather than token-level streaming: the gateway layer
/// is responsible for relaying whatever partial text it has to the chat
/// client, this type only needs the final tool-call decision per step.
pub struct ModelClient {
    http: Client,
    config: ProviderConfig,
}

impl ModelClient {
    pub fn new(config: ProviderConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client with rustls-tls backend must build");
        Self { http, config }
    }

    pub async fn step(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<ModelResponse> {
        let tool_defs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if !tool_defs.is_empty() {
            body["tools"] = Value::Array(tool_defs);
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("model provider request failed")?;

        let status = response.status();
        let payload: Value = response.json().await.context("model provider returned non-JSON body")?;
        if !status.is_success() {
            anyhow::bail!("model provider returned {status}: {payload}");
        }

        parse_response(&payload)
    }
}

fn parse_response(payload: &Value) -> Result<ModelResponse> {
    let choice = payload["choices"]
        .as_array()
        .and_then(|arr| arr.first())
        .context("no choices in model provider response")?;
    let message = &choice["message"];
    let content = message["content"].as_str().map(String::from);

    let mut tool_calls = Vec::new();
    if let Some(array) = message["tool_calls"].as_array() {
        for tc in array {
            let Some(function) = tc["function"].as_object() else { continue };
            let arguments = function["arguments"]
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_else(|| json!({}));
            tool_calls.push(ToolCallRequest {
                id: tc["id"].as_str().unwrap_or_default().to_string(),
                name: function["name"].as_str().unwrap_or_default().to_string(),
                arguments,
            });
        }
    }

    Ok(ModelResponse { content, tool_calls })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_reply() {
        let payload = json!({"choices": [{"message": {"content": "hello"}}]});
        let resp = parse_response(&payload).unwrap();
        assert_eq!(resp.content.as_deref(), Some("hello"));
        assert!(!resp.has_tool_calls());
    }

    #[test]
    fn parses_tool_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "list_customers_ab12cd34", "arguments": "{\"limit\":5}"}
                    }]
                }
            }]
        });
        let resp = parse_response(&payload).unwrap();
        assert!(resp.has_tool_calls());
        assert_eq!(resp.tool_calls[0].name, "list_customers_ab12cd34");
        assert_eq!(resp.tool_calls[0].arguments, json!({"limit": 5}));
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(parse_response(&json!({})).is_err());
    }
}
