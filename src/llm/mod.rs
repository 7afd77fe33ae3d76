//! Conversational model abstraction.
//!
//! The orchestrator only sees [`ModelClient`]: one round-trip per call,
//! given the message history and the available tool schemas, returning
//! either plain text or a set of requested tool calls. History management
//! and the tool-call loop live in the agent layer; providers are stateless.

pub mod dummy;
pub mod openai_compatible;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ModelConfig;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("unknown model provider: {0}")]
    UnknownProvider(String),
}

// ── Message types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One turn in a conversation thread.
///
/// `tool_calls` is only populated on assistant turns that requested tools;
/// `tool_call_id` only on tool-result turns. Both are ephemeral — they live
/// in the running message list of a single model turn, never in the session
/// thread.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls, tool_call_id: None }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation requested by the model. `arguments` is the raw JSON
/// string exactly as the model produced it.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Schema advertised to the model for one capability.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters, written directly as data.
    pub parameters: serde_json::Value,
}

/// The model's reply for one round-trip: text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

// ── Provider contract ─────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`ModelClient::complete`].
pub type ModelFuture = Pin<Box<dyn Future<Output = Result<ModelTurn, ProviderError>> + Send + 'static>>;

/// One chat completion round-trip. Implementations clone what they need out
/// of `&self` so the returned future is `'static`.
pub trait ModelClient: std::fmt::Debug + Send + Sync + 'static {
    fn complete(&self, messages: &[Message], tools: &[ToolSchema]) -> ModelFuture;
}

/// Build the configured provider.
pub fn build(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, ProviderError> {
    match config.provider.as_str() {
        "ollama" | "openai" => Ok(Arc::new(openai_compatible::OpenAiCompatibleClient::new(
            config.api_base_url.clone(),
            config.model.clone(),
            config.timeout_seconds,
            config.api_key.clone(),
        )?)),
        "dummy" => Ok(Arc::new(dummy::DummyModel::new())),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            api_base_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            timeout_seconds: 5,
            api_key: None,
        }
    }

    #[test]
    fn build_known_providers() {
        assert!(build(&model_config("ollama")).is_ok());
        assert!(build(&model_config("openai")).is_ok());
        assert!(build(&model_config("dummy")).is_ok());
    }

    #[test]
    fn build_unknown_provider_errors() {
        let err = build(&model_config("clippy")).unwrap_err();
        assert!(err.to_string().contains("clippy"));
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        let t = Message::tool("call_1", "out");
        assert_eq!(t.role, Role::Tool);
        assert_eq!(t.tool_call_id.as_deref(), Some("call_1"));
    }
}
