//! olu-agent: a tool-using chat service.
//!
//! An HTTP chat API (OpenAI envelope, blocking or SSE) in front of an
//! orchestrator that drives a conversational model through capability
//! tools, with an optionally-supervised agent-shell sidecar for delegated
//! multi-step work.
//!
//! Everything is public so integration tests can exercise the internals.

pub mod agent;
pub mod channel;
pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod repl;
pub mod server;
pub mod sessions;
pub mod sidecar;
pub mod tools;
