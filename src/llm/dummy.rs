//! Offline model implementations.
//!
//! [`DummyModel`] is a deployable provider (`OLU_MODEL_PROVIDER=dummy`) that
//! echoes the last user message; it keeps the whole service runnable with no
//! model backend. [`ScriptedModel`] replays a fixed sequence of turns and is
//! only meant for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{Message, ModelClient, ModelFuture, ModelTurn, ProviderError, Role, ToolSchema};

/// Echoes the last user message. Never requests tools.
#[derive(Debug)]
pub struct DummyModel;

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelClient for DummyModel {
    fn complete(&self, messages: &[Message], _tools: &[ToolSchema]) -> ModelFuture {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Box::pin(async move {
            Ok(ModelTurn { content: format!("echo: {last_user}"), tool_calls: Vec::new() })
        })
    }
}

/// Replays a queue of pre-scripted turns, one per `complete` call.
///
/// Runs out of script -> plain "done" turn, so a looping caller always
/// terminates.
#[derive(Debug)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self { turns: Mutex::new(turns.into()) }
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, _messages: &[Message], _tools: &[ToolSchema]) -> ModelFuture {
        let turn = self
            .turns
            .lock()
            .map_err(|_| ProviderError::Request("script mutex poisoned".into()))
            .map(|mut q| {
                q.pop_front()
                    .unwrap_or(ModelTurn { content: "done".into(), tool_calls: Vec::new() })
            });

        Box::pin(async move { turn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[tokio::test]
    async fn dummy_echoes_last_user_message() {
        let model = DummyModel::new();
        let messages = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        let turn = model.complete(&messages, &[]).await.unwrap();
        assert_eq!(turn.content, "echo: second");
        assert!(turn.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn scripted_replays_in_order_then_falls_back() {
        let model = ScriptedModel::new(vec![
            ModelTurn {
                content: "thinking".into(),
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "shell".into(),
                    arguments: "{}".into(),
                }],
            },
            ModelTurn { content: "answer".into(), tool_calls: Vec::new() },
        ]);

        let t1 = model.complete(&[], &[]).await.unwrap();
        assert_eq!(t1.tool_calls.len(), 1);
        let t2 = model.complete(&[], &[]).await.unwrap();
        assert_eq!(t2.content, "answer");
        let t3 = model.complete(&[], &[]).await.unwrap();
        assert_eq!(t3.content, "done");
    }
}
