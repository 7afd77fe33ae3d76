//! Public chat API over HTTP.
//!
//! Two endpoints: `GET /health` and `POST /v1/chat/completions` in the
//! OpenAI envelope shape, with `stream: true` switching to Server-Sent
//! Events. Sessions are selected by the optional `session_id` field.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::{Agent, AgentEvent};
use crate::channel::{Channel, ChannelFuture};
use crate::error::AppError;
use crate::sessions::SessionStore;

const DEFAULT_SESSION_ID: &str = "default";

/// Shared handler state. Cheap to clone: three `Arc`s.
#[derive(Clone)]
pub struct ServerState {
    pub agent: Arc<Agent>,
    pub sessions: Arc<SessionStore>,
    pub agent_shell_available: Arc<AtomicBool>,
}

// ── Request / response shapes ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<IncomingMessage>,
    #[serde(default)]
    stream: bool,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[allow(dead_code)]
    role: Option<String>,
    content: Option<String>,
}

fn completion_envelope(id: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
    })
}

fn delta_event(chunk: &str) -> serde_json::Value {
    json!({
        "choices": [{"delta": {"content": chunk}, "index": 0}],
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn health(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "agent_shell": state.agent_shell_available.load(Ordering::SeqCst),
    }))
}

async fn chat_completions(
    State(state): State<ServerState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let session_id = request
        .session_id
        .as_deref()
        .unwrap_or(DEFAULT_SESSION_ID)
        .to_string();

    // Only the newest user message matters; history lives in the session.
    let user_message = request
        .messages
        .last()
        .and_then(|m| m.content.clone())
        .unwrap_or_default();

    debug!(session = %session_id, stream = request.stream, "chat request");

    let thread = state.sessions.get_or_create(&session_id);
    let (tx, rx) = mpsc::unbounded_channel::<AgentEvent>();

    if request.stream {
        let agent = Arc::clone(&state.agent);
        // The turn keeps running if the client disconnects; the dropped
        // receiver just swallows the remaining events.
        tokio::spawn(async move {
            agent.run_turn(thread, user_message, tx).await;
        });
        Sse::new(event_stream(rx)).into_response()
    } else {
        let answer = state.agent.run_turn(thread, user_message, tx).await;
        let id = format!("chatcmpl-{}", Uuid::new_v4());
        (StatusCode::OK, Json(completion_envelope(&id, &answer))).into_response()
    }
}

fn event_stream(
    rx: mpsc::UnboundedReceiver<AgentEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let events = UnboundedReceiverStream::new(rx).filter_map(|event| match event {
        AgentEvent::Content(chunk) => Some(Ok(Event::default().data(delta_event(&chunk).to_string()))),
        AgentEvent::Error(message) => {
            Some(Ok(Event::default().event("error").data(json!({"error": message}).to_string())))
        }
        // Done closes the channel; the sentinel below is the visible end.
        AgentEvent::Done(_) => None,
    });

    events.chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))))
}

// ── Router / channel ──────────────────────────────────────────────────────────

pub fn build_router(state: ServerState) -> Router {
    // Permissive CORS: browser-based clients talk to this API directly.
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The HTTP front end as a runnable channel.
pub struct HttpServer {
    state: ServerState,
    port: u16,
}

impl HttpServer {
    pub fn new(state: ServerState, port: u16) -> Self {
        Self { state, port }
    }
}

impl Channel for HttpServer {
    fn id(&self) -> &str {
        "http"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| AppError::Server(format!("could not bind {addr}: {e}")))?;

            info!(%addr, "chat API listening");

            let router = build_router(self.state);
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .map_err(|e| AppError::Server(format!("server error: {e}")))?;

            info!("chat API stopped");
            Ok(())
        })
    }
}
