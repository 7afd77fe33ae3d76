use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use olu_agent::agent::Agent;
use olu_agent::channel::{spawn_channels, Channel};
use olu_agent::repl::ReplChannel;
use olu_agent::server::{HttpServer, ServerState};
use olu_agent::sessions::{SessionStore, DEFAULT_SESSION_CAP};
use olu_agent::sidecar::SidecarSupervisor;
use olu_agent::tools;
use olu_agent::tools::ToolRegistry;
use olu_agent::{config, error::AppError, llm, logger};

struct CliArgs {
    interactive: bool,
    verbosity: u8,
}

/// Minimal flag parsing: `-i` for the interactive console, `-v`/`-vv` to
/// raise log verbosity, `-h` for usage.
fn parse_cli_args() -> CliArgs {
    let mut args = CliArgs { interactive: false, verbosity: 0 };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-i" | "--interactive" => args.interactive = true,
            "-v" => args.verbosity = 1,
            "-vv" => args.verbosity = 2,
            "-h" | "--help" => {
                println!("usage: olu-agent [-i] [-v|-vv]");
                println!("  -i   interactive console alongside the HTTP server");
                println!("  -v   debug logging (-vv for trace)");
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    args
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("fatal: {e}");
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();
    let args = parse_cli_args();

    let config = config::load()?;
    let level = match args.verbosity {
        0 => config.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    logger::init(&level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting olu-agent");

    // Best-effort: a missing or broken sidecar degrades delegation, nothing else.
    let supervisor = Arc::new(SidecarSupervisor::new(&config.sidecar));
    let sidecar_up = supervisor.ensure_available().await;
    if !sidecar_up {
        warn!("agent-shell unavailable; delegation tool will redirect to direct tools");
    }

    let model = llm::build(&config.model)
        .map_err(|e| AppError::Config(e.to_string()))?;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(tools::fs::ReadFileTool));
    registry.register(Arc::new(tools::fs::WriteFileTool));
    registry.register(Arc::new(tools::fs::ListDirectoryTool));
    registry.register(Arc::new(tools::shell::RunShellCommandTool));
    registry.register(Arc::new(tools::shell::RunPythonCodeTool));
    registry.register(Arc::new(tools::search::SearchFilesTool));
    registry.register(Arc::new(
        tools::web::FetchWebPageTool::new().map_err(AppError::Config)?,
    ));
    registry.register(Arc::new(
        tools::delegate::DelegateTool::new(&supervisor.base_url(), supervisor.availability())
            .map_err(AppError::Config)?,
    ));
    info!(tools = registry.len(), "tool registry ready");

    let agent = Arc::new(Agent::new(model, Arc::new(registry)));
    let sessions = Arc::new(SessionStore::new(DEFAULT_SESSION_CAP));

    let state = ServerState {
        agent: Arc::clone(&agent),
        sessions: Arc::clone(&sessions),
        agent_shell_available: supervisor.availability(),
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received; shutting down");
                shutdown.cancel();
            }
        });
    }

    let mut channels: Vec<Box<dyn Channel>> =
        vec![Box::new(HttpServer::new(state, config.server_port))];
    if args.interactive {
        channels.push(Box::new(ReplChannel::new(Arc::clone(&agent), Arc::clone(&sessions))));
    }

    println!("olu-agent on port {} (model: {}, agent-shell: {})",
        config.server_port,
        config.model.model,
        if sidecar_up { "up" } else { "down" },
    );

    let result = spawn_channels(channels, shutdown.clone()).join().await;

    shutdown.cancel();
    supervisor.stop().await;
    info!("shutdown complete");

    result
}
