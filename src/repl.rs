//! Interactive console channel (`-i`).
//!
//! Reads lines from stdin, runs each as a turn against a single console
//! session, and prints chunks as the model produces them. `exit`/`quit`
//! or EOF ends the loop.

use std::sync::Arc;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::{Agent, AgentEvent};
use crate::channel::{Channel, ChannelFuture};
use crate::sessions::SessionStore;

const CONSOLE_SESSION_ID: &str = "console";

pub struct ReplChannel {
    agent: Arc<Agent>,
    sessions: Arc<SessionStore>,
}

impl ReplChannel {
    pub fn new(agent: Arc<Agent>, sessions: Arc<SessionStore>) -> Self {
        Self { agent, sessions }
    }
}

impl Channel for ReplChannel {
    fn id(&self) -> &str {
        "repl"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(async move {
            let mut lines = BufReader::new(stdin()).lines();
            println!("interactive console; 'exit' or Ctrl-D to leave");

            loop {
                print_prompt();

                let line = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    line = lines.next_line() => line?,
                };

                let Some(line) = line else {
                    // EOF
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }

                let thread = self.sessions.get_or_create(CONSOLE_SESSION_ID);
                let (tx, mut rx) = mpsc::unbounded_channel::<AgentEvent>();

                let agent = Arc::clone(&self.agent);
                let input = line.to_string();
                let turn = tokio::spawn(async move {
                    agent.run_turn(thread, input, tx).await;
                });

                while let Some(event) = rx.recv().await {
                    match event {
                        AgentEvent::Content(chunk) => {
                            print!("{chunk}");
                            let _ = std::io::Write::flush(&mut std::io::stdout());
                        }
                        AgentEvent::Error(message) => eprintln!("error: {message}"),
                        AgentEvent::Done(_) => println!(),
                    }
                }
                let _ = turn.await;
            }

            debug!("console closed");
            Ok(())
        })
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}
