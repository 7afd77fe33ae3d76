//! Delegation to the agent-shell sidecar.
//!
//! The availability flag is owned by the sidecar supervisor and shared here
//! as an atomic. When the sidecar never came up, the tool answers with a
//! fixed redirect message instead of attempting the request, so the model
//! falls back to the direct tools without a transport error in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use super::{Tool, ToolFuture};

const DELEGATE_TIMEOUT: Duration = Duration::from_secs(120);

const UNAVAILABLE_MSG: &str =
    "Error: agent-shell backend is not available. Use the direct tools instead.";

pub struct DelegateTool {
    http: reqwest::Client,
    completions_url: String,
    available: Arc<AtomicBool>,
}

impl DelegateTool {
    /// `base_url` is the sidecar origin, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str, available: Arc<AtomicBool>) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(DELEGATE_TIMEOUT)
            .build()
            .map_err(|e| format!("failed to build http client: {e}"))?;
        Ok(Self {
            http,
            completions_url: format!("{base_url}/v1/chat/completions"),
            available,
        })
    }
}

impl Tool for DelegateTool {
    fn name(&self) -> &str {
        "delegate_to_agent_shell"
    }

    fn description(&self) -> &str {
        "Delegate a complex multi-step task to the agent-shell backend, which \
         has its own planning and tool execution. Prefer the direct tools for \
         simple single-step work."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "Full task description for the backend"}
            },
            "required": ["task"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        let http = self.http.clone();
        let url = self.completions_url.clone();
        let available = self.available.load(Ordering::SeqCst);

        Box::pin(async move {
            let task = args
                .get("task")
                .and_then(|v| v.as_str())
                .ok_or("missing required argument 'task'")?
                .to_string();

            if !available {
                return Ok(UNAVAILABLE_MSG.to_string());
            }

            debug!(chars = task.len(), "delegating task to agent-shell");

            let body = json!({
                "messages": [{"role": "user", "content": task}],
                "stream": false,
            });

            let response = match http.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => return Ok(format!("Error communicating with agent-shell: {e}")),
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Ok(format!("agent-shell returned status {status}: {body}"));
            }

            let parsed: serde_json::Value = match response.json().await {
                Ok(v) => v,
                Err(e) => return Ok(format!("Error communicating with agent-shell: {e}")),
            };

            let answer = parsed["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or("No response from agent-shell")
                .to_string();

            Ok(answer)
        })
    }
}
