//! Capability tools the model can invoke.
//!
//! Every tool resolves to text. Failures inside a tool (bad arguments,
//! missing files, timeouts, unreachable backends) come back as an
//! error-flagged [`ToolOutput`], never as an `Err` out of the registry —
//! the model reads the message and decides what to do next.

pub mod delegate;
pub mod fs;
pub mod search;
pub mod shell;
pub mod web;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::ToolSchema;

/// A boxed, owned future returned by [`Tool::call`].
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'static>>;

/// One capability exposed to the model.
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;
    /// Run the tool. `args` is the already-parsed arguments object.
    fn call(&self, args: serde_json::Value) -> ToolFuture;
}

/// Result of one tool execution, always text.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }
}

/// Name-indexed set of tools, built once at startup and shared read-only.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas for every registered tool, sorted by name so the model sees a
    /// stable ordering across requests.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute `name` with `args`. Never fails: unknown tools and tool
    /// errors become error-flagged text.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "model requested unknown tool");
            return ToolOutput::error(format!("Tool not found: {name}"));
        };

        debug!(tool = name, "executing tool");
        match tool.call(args).await {
            Ok(content) => ToolOutput::ok(content),
            Err(message) => {
                warn!(tool = name, error = %message, "tool failed");
                ToolOutput::error(format!("Error: {message}"))
            }
        }
    }
}

/// Cut `text` at `limit` characters, appending a note with the true length.
/// Used by every tool that can produce unbounded output.
pub(crate) fn truncate_output(text: String, limit: usize, what: &str) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    let total = text.chars().count();
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}... [truncated, {what} is {total} chars total]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercase the input"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }
        fn call(&self, args: serde_json::Value) -> ToolFuture {
            Box::pin(async move {
                let text = args["text"].as_str().ok_or("missing 'text' argument")?;
                Ok(text.to_uppercase())
            })
        }
    }

    struct AlwaysFails;

    impl Tool for AlwaysFails {
        fn name(&self) -> &str {
            "fails"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }
        fn call(&self, _args: serde_json::Value) -> ToolFuture {
            Box::pin(async { Err("deliberate failure".to_string()) })
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(Upper));
        r.register(Arc::new(AlwaysFails));
        r
    }

    #[tokio::test]
    async fn execute_dispatches_by_name() {
        let out = registry().execute("upper", json!({"text": "hi"})).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "HI");
    }

    #[tokio::test]
    async fn unknown_tool_is_text_not_panic() {
        let out = registry().execute("nope", json!({})).await;
        assert!(out.is_error);
        assert_eq!(out.content, "Tool not found: nope");
    }

    #[tokio::test]
    async fn tool_error_becomes_error_text() {
        let out = registry().execute("fails", json!({})).await;
        assert!(out.is_error);
        assert_eq!(out.content, "Error: deliberate failure");
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let schemas = registry().schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "fails");
        assert_eq!(schemas[1].name, "upper");
    }

    #[test]
    fn truncation_notes_true_length() {
        let long = "x".repeat(120);
        let cut = truncate_output(long, 100, "output");
        assert!(cut.starts_with(&"x".repeat(100)));
        assert!(cut.ends_with("[truncated, output is 120 chars total]"));

        let short = truncate_output("short".to_string(), 100, "output");
        assert_eq!(short, "short");
    }
}
