//! OpenAI-compatible chat completions client.
//!
//! Works against any server that speaks the `/v1/chat/completions` wire
//! format: a local Ollama, vLLM, or the hosted OpenAI API. Tool calling
//! uses the `tools` / `tool_calls` extension of the same format.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use super::{Message, ModelClient, ModelFuture, ModelTurn, ProviderError, ToolCall, ToolSchema};

#[derive(Debug)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        api_url: String,
        model: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build http client: {e}")))?;
        Ok(Self { http, api_url, model, api_key })
    }
}

impl ModelClient for OpenAiCompatibleClient {
    fn complete(&self, messages: &[Message], tools: &[ToolSchema]) -> ModelFuture {
        let http = self.http.clone();
        let api_url = self.api_url.clone();
        let api_key = self.api_key.clone();
        let body = build_request_body(&self.model, messages, tools);

        Box::pin(async move {
            trace!(url = %api_url, "sending chat completion request");

            let mut request = http.post(&api_url).json(&body);
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ProviderError::Request(format!("request to {api_url} failed: {e}")))?;

            let response = check_status(response).await?;

            let completion: WireCompletion = response
                .json()
                .await
                .map_err(|e| ProviderError::Request(format!("invalid completion body: {e}")))?;

            let choice = completion
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Request("completion had no choices".into()))?;

            let tool_calls: Vec<ToolCall> = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|c| ToolCall { id: c.id, name: c.function.name, arguments: c.function.arguments })
                .collect();

            debug!(
                tool_calls = tool_calls.len(),
                finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
                "chat completion received"
            );

            Ok(ModelTurn { content: choice.message.content.unwrap_or_default(), tool_calls })
        })
    }
}

fn build_request_body(model: &str, messages: &[Message], tools: &[ToolSchema]) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = messages.iter().map(wire_message).collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": false,
    });

    if !tools.is_empty() {
        let tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    body
}

fn wire_message(message: &Message) -> serde_json::Value {
    let mut value = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });

    if !message.tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = message
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
        value["tool_calls"] = serde_json::Value::Array(calls);
    }

    if let Some(id) = &message.tool_call_id {
        value["tool_call_id"] = json!(id);
    }

    value
}

/// Map a non-success HTTP status to a [`ProviderError`], pulling the message
/// out of the OpenAI-style error envelope when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<WireErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    let detail = if detail.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        detail
    };

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Request(format!("authentication failed ({status}): {detail}"))
        }
        StatusCode::NOT_FOUND => {
            ProviderError::Request(format!("model or endpoint not found ({status}): {detail}"))
        }
        _ => ProviderError::Request(format!("server returned {status}: {detail}")),
    })
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireCompletion {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireErrorEnvelope {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireErrorDetail {
    message: String,
}
