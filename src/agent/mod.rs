//! The orchestrator: one user turn, driven to completion.
//!
//! A turn is a loop of model round-trips. While the model keeps requesting
//! tools, each batch is executed and fed back; once it answers with plain
//! text the turn is done. Tool-call ephemera (assistant tool_calls and tool
//! results) live only inside the turn's working list; the session thread
//! keeps just the user message and the final assistant text.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::llm::{Message, ModelClient, ModelTurn};
use crate::sessions::SharedThread;
use crate::tools::ToolRegistry;

/// Upper bound on model round-trips per user turn. Reaching it means the
/// model is stuck in a tool loop; the turn ends with whatever text has
/// accumulated.
pub const MAX_TOOL_ITERATIONS: usize = 20;

const MAX_ITERATIONS_NOTE: &str = "[agent reached maximum tool iterations]";

/// Standing instructions injected as the first message of every new thread.
const INSTRUCTIONS: &str = "\
You are a capable assistant with access to tools for reading and writing \
files, running shell commands and Python code, searching directories, \
fetching web pages, and delegating complex multi-step tasks to an \
agent-shell backend. Use tools when they help; answer directly when they \
don't. When a tool returns an error, read the message and either adjust \
your approach or explain the problem to the user. Keep answers concise.";

/// Progress events emitted while a turn runs.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A chunk of assistant text, in order.
    Content(String),
    /// The turn finished; carries the complete assistant answer.
    Done(String),
    /// The turn aborted; carries a description of what failed.
    Error(String),
}

pub struct Agent {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { model, tools }
    }

    /// Run one user turn against `thread`, emitting [`AgentEvent`]s as the
    /// answer takes shape. Returns the complete answer text.
    ///
    /// Event sends are best-effort: a dropped receiver (client went away)
    /// never aborts the turn, so the thread still records the answer.
    pub async fn run_turn(
        &self,
        thread: SharedThread,
        user_message: String,
        events: UnboundedSender<AgentEvent>,
    ) -> String {
        let mut working = {
            let mut thread = thread.lock().await;
            if thread.messages.is_empty() {
                thread.messages.push(Message::system(INSTRUCTIONS));
            }
            thread.messages.push(Message::user(user_message));
            thread.messages.clone()
        };

        let schemas = self.tools.schemas();
        let mut answer = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let turn = match self.model.complete(&working, &schemas).await {
                Ok(turn) => turn,
                Err(e) => {
                    // The failure becomes part of the answer text, so blocking
                    // callers see it too, not just SSE subscribers.
                    error!("model round-trip failed: {e}");
                    let _ = events.send(AgentEvent::Error(e.to_string()));
                    if !answer.is_empty() && !answer.ends_with('\n') {
                        answer.push('\n');
                    }
                    answer.push_str(&format!("[{e}]"));
                    self.finish(&thread, &answer, &events).await;
                    return answer;
                }
            };

            if turn.tool_calls.is_empty() {
                if !turn.content.is_empty() {
                    answer.push_str(&turn.content);
                    let _ = events.send(AgentEvent::Content(turn.content));
                }
                debug!(iterations = iteration + 1, "turn complete");
                self.finish(&thread, &answer, &events).await;
                return answer;
            }

            // Interim text arrives before the tool results it refers to.
            if !turn.content.is_empty() {
                answer.push_str(&turn.content);
                let _ = events.send(AgentEvent::Content(turn.content.clone()));
            }

            self.execute_batch(&mut working, turn).await;
        }

        info!("turn hit the tool iteration ceiling");
        if !answer.is_empty() && !answer.ends_with('\n') {
            answer.push('\n');
        }
        answer.push_str(MAX_ITERATIONS_NOTE);
        let _ = events.send(AgentEvent::Content(MAX_ITERATIONS_NOTE.to_string()));
        self.finish(&thread, &answer, &events).await;
        answer
    }

    /// Execute one batch of tool calls, appending the assistant request and
    /// every result to the working list.
    async fn execute_batch(&self, working: &mut Vec<Message>, turn: ModelTurn) {
        let calls = turn.tool_calls;
        working.push(Message::assistant_with_calls(turn.content, calls.clone()));

        for call in calls {
            let output = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
                Ok(args) => self.tools.execute(&call.name, args).await.content,
                Err(e) => format!("Invalid JSON arguments: {e}"),
            };
            debug!(tool = %call.name, chars = output.len(), "tool result");
            working.push(Message::tool(call.id, output));
        }
    }

    async fn finish(&self, thread: &SharedThread, answer: &str, events: &UnboundedSender<AgentEvent>) {
        thread.lock().await.messages.push(Message::assistant(answer));
        let _ = events.send(AgentEvent::Done(answer.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::dummy::ScriptedModel;
    use crate::llm::{Role, ToolCall};
    use crate::sessions::SessionStore;
    use crate::tools::{Tool, ToolFuture};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        fn call(&self, args: serde_json::Value) -> ToolFuture {
            Box::pin(async move { Ok(args["text"].as_str().unwrap_or_default().to_string()) })
        }
    }

    fn agent(turns: Vec<ModelTurn>) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Echo));
        Agent::new(Arc::new(ScriptedModel::new(turns)), Arc::new(tools))
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall { id: id.into(), name: name.into(), arguments: arguments.into() }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn plain_answer_needs_one_round_trip() {
        let agent = agent(vec![ModelTurn { content: "hi there".into(), tool_calls: vec![] }]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, rx) = mpsc::unbounded_channel();

        let answer = agent.run_turn(Arc::clone(&thread), "hello".into(), tx).await;
        assert_eq!(answer, "hi there");

        let events = drain(rx).await;
        assert!(matches!(&events[0], AgentEvent::Content(c) if c == "hi there"));
        assert!(matches!(&events[1], AgentEvent::Done(d) if d == "hi there"));
    }

    #[tokio::test]
    async fn tool_loop_concatenates_interim_and_final_text() {
        let agent = agent(vec![
            ModelTurn {
                content: "Hel".into(),
                tool_calls: vec![call("c1", "echo", r#"{"text": "x"}"#)],
            },
            ModelTurn { content: "lo".into(), tool_calls: vec![] },
        ]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, rx) = mpsc::unbounded_channel();

        let answer = agent.run_turn(Arc::clone(&thread), "hello".into(), tx).await;
        assert_eq!(answer, "Helo");

        let chunks: Vec<String> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::Content(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn thread_keeps_only_user_and_final_assistant() {
        let agent = agent(vec![
            ModelTurn { content: String::new(), tool_calls: vec![call("c1", "echo", "{}")] },
            ModelTurn { content: "done".into(), tool_calls: vec![] },
        ]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, _rx) = mpsc::unbounded_channel();

        agent.run_turn(Arc::clone(&thread), "go".into(), tx).await;

        let messages = &thread.lock().await.messages;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(messages.iter().all(|m| m.tool_calls.is_empty()));
    }

    #[tokio::test]
    async fn bad_tool_arguments_feed_back_as_text() {
        let agent = agent(vec![
            ModelTurn {
                content: String::new(),
                tool_calls: vec![call("c1", "echo", "{not json")],
            },
            ModelTurn { content: "recovered".into(), tool_calls: vec![] },
        ]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, _rx) = mpsc::unbounded_channel();

        let answer = agent.run_turn(thread, "go".into(), tx).await;
        assert_eq!(answer, "recovered");
    }

    #[tokio::test]
    async fn iteration_ceiling_ends_the_turn() {
        // Every scripted turn requests another tool call; the loop must stop.
        let turns: Vec<ModelTurn> = (0..MAX_TOOL_ITERATIONS + 5)
            .map(|i| ModelTurn {
                content: String::new(),
                tool_calls: vec![call(&format!("c{i}"), "echo", "{}")],
            })
            .collect();
        let agent = agent(turns);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, rx) = mpsc::unbounded_channel();

        let answer = agent.run_turn(Arc::clone(&thread), "go".into(), tx).await;
        assert!(answer.contains("maximum tool iterations"));

        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(AgentEvent::Done(_))));
    }

    #[tokio::test]
    async fn model_failure_surfaces_in_the_answer_text() {
        use crate::llm::{ModelFuture, ProviderError, ToolSchema};

        #[derive(Debug)]
        struct BrokenModel;
        impl crate::llm::ModelClient for BrokenModel {
            fn complete(&self, _messages: &[Message], _tools: &[ToolSchema]) -> ModelFuture {
                Box::pin(async { Err(ProviderError::Request("connection refused".into())) })
            }
        }

        let agent = Agent::new(Arc::new(BrokenModel), Arc::new(ToolRegistry::new()));
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, rx) = mpsc::unbounded_channel();

        let answer = agent.run_turn(Arc::clone(&thread), "go".into(), tx).await;
        assert!(answer.contains("connection refused"), "got: {answer}");

        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::Error(_))));
        assert!(matches!(events.last(), Some(AgentEvent::Done(d)) if d.contains("connection refused")));
        // The thread records the failed turn like any other.
        assert!(thread.lock().await.messages.last().unwrap().content.contains("connection refused"));
    }

    #[tokio::test]
    async fn dropped_receiver_still_records_the_answer() {
        let agent = agent(vec![ModelTurn { content: "quiet".into(), tool_calls: vec![] }]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let answer = agent.run_turn(Arc::clone(&thread), "go".into(), tx).await;
        assert_eq!(answer, "quiet");
        assert_eq!(thread.lock().await.messages.last().unwrap().content, "quiet");
    }

    #[tokio::test]
    async fn second_turn_sees_first_turn_history() {
        let agent = agent(vec![
            ModelTurn { content: "one".into(), tool_calls: vec![] },
            ModelTurn { content: "two".into(), tool_calls: vec![] },
        ]);
        let store = SessionStore::new(10);
        let thread = store.get_or_create("s");

        let (tx, _rx) = mpsc::unbounded_channel();
        agent.run_turn(Arc::clone(&thread), "first".into(), tx).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        agent.run_turn(Arc::clone(&thread), "second".into(), tx).await;

        let messages = &thread.lock().await.messages;
        // system + (user, assistant) x 2
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3].content, "second");
        assert_eq!(messages[4].content, "two");
    }
}
