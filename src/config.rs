//! Configuration from environment variables.
//!
//! Every knob has a documented default so a bare `olu-agent` run works
//! against a local Ollama with no setup. A `.env` file (loaded in `main`)
//! can supply any of these.
//!
//! | Variable | Default |
//! |---|---|
//! | `AGENT_SHELL_BINARY` | `target/release/agent-shell` |
//! | `AGENT_SHELL_HOST` | `127.0.0.1` |
//! | `AGENT_SHELL_PORT` | `8080` |
//! | `AGENT_SERVER_PORT` | `8087` |
//! | `OLLAMA_MODEL_ID` | `llama3.2` |
//! | `OLLAMA_API_BASE` | `http://127.0.0.1:11434/v1/chat/completions` |
//! | `OLU_MODEL_PROVIDER` | `ollama` (`dummy` for offline echo) |
//! | `OLU_MODEL_TIMEOUT_SECONDS` | `120` |
//! | `OLU_LOG_LEVEL` | `info` (`RUST_LOG` wins when set) |
//! | `LLM_API_KEY` | unset (keyless local models) |

use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Sidecar (agent-shell) process settings.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Path to the agent-shell binary (`~` already expanded).
    pub binary: PathBuf,
    /// Host the sidecar binds/listens on.
    pub host: String,
    /// Port the sidecar binds/listens on.
    pub port: u16,
}

impl SidecarConfig {
    /// Loopback base URL of the sidecar HTTP endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Conversational model settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Which provider is active (`"ollama"` or `"dummy"`).
    pub provider: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// API key from `LLM_API_KEY` env — `None` for keyless local models.
    pub api_key: Option<String>,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the public chat API binds to.
    pub server_port: u16,
    pub sidecar: SidecarConfig,
    pub model: ModelConfig,
    pub log_level: String,
}

/// Load configuration from the process environment.
pub fn load() -> Result<Config, AppError> {
    from_lookup(|key| env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary key lookup.
///
/// Tests pass a closure over a map instead of mutating the process
/// environment.
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Config, AppError> {
    let binary = get("AGENT_SHELL_BINARY").unwrap_or_else(|| "target/release/agent-shell".to_string());
    let sidecar = SidecarConfig {
        binary: expand_home(&binary),
        host: get("AGENT_SHELL_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
        port: parse_port(&get, "AGENT_SHELL_PORT", 8080)?,
    };

    let model = ModelConfig {
        provider: get("OLU_MODEL_PROVIDER").unwrap_or_else(|| "ollama".to_string()),
        model: get("OLLAMA_MODEL_ID").unwrap_or_else(|| "llama3.2".to_string()),
        api_base_url: get("OLLAMA_API_BASE")
            .unwrap_or_else(|| "http://127.0.0.1:11434/v1/chat/completions".to_string()),
        timeout_seconds: parse_u64(&get, "OLU_MODEL_TIMEOUT_SECONDS", 120)?,
        api_key: get("LLM_API_KEY"),
    };

    Ok(Config {
        server_port: parse_port(&get, "AGENT_SERVER_PORT", 8087)?,
        sidecar,
        model,
        log_level: get("OLU_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    })
}

fn parse_port(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u16,
) -> Result<u16, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("{key}={raw}: {e}"))),
    }
}

fn parse_u64(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("{key}={raw}: {e}"))),
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
