//! Supervision of the agent-shell sidecar process.
//!
//! The sidecar is an optional local backend reached over loopback HTTP. At
//! startup [`SidecarSupervisor::ensure_available`] makes it reachable if it
//! can: reuse an already-running instance, else spawn the binary and wait
//! for its health endpoint. The service runs fine without it; the delegate
//! tool just answers with a redirect message.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::SidecarConfig;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const SPAWN_POLL_ATTEMPTS: usize = 20;
const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct SidecarSupervisor {
    config: SidecarConfig,
    http: reqwest::Client,
    /// The child we spawned, if any. `None` when the sidecar was already
    /// running (someone else owns it) or never came up. Held for the whole
    /// spawn-and-poll sequence, so concurrent `ensure_available` callers
    /// serialize and the loser reads the settled flag.
    process: Mutex<Option<Child>>,
    available: Arc<AtomicBool>,
}

impl SidecarSupervisor {
    pub fn new(config: &SidecarConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HEALTH_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            config: config.clone(),
            http,
            process: Mutex::new(None),
            available: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Loopback origin of the sidecar, e.g. `http://127.0.0.1:8080`.
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Shared availability flag, read by the delegate tool and the health
    /// endpoint.
    pub fn availability(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.available)
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Make the sidecar reachable if possible, recording the outcome in the
    /// availability flag.
    ///
    /// Order: missing binary means a definite no; a passing health probe
    /// means someone already runs it and we adopt it without spawning;
    /// otherwise spawn and poll. A spawn that starts but never answers the
    /// probe is still reported available, since slow model loading in the
    /// sidecar routinely outlasts the polling window. `false` only when the
    /// spawn itself failed.
    pub async fn ensure_available(&self) -> bool {
        if !self.config.binary.is_file() {
            warn!(binary = %self.config.binary.display(), "agent-shell binary not found; running without sidecar");
            self.available.store(false, Ordering::SeqCst);
            return false;
        }

        if self.probe_health().await {
            info!(url = %self.base_url(), "agent-shell already running");
            self.available.store(true, Ordering::SeqCst);
            return true;
        }

        let mut process = self.process.lock().await;
        if process.is_some() {
            // Another caller finished the spawn sequence while we waited on
            // the lock; the flag is already settled.
            return self.is_available();
        }

        info!(binary = %self.config.binary.display(), port = self.config.port, "starting agent-shell");
        let child = Command::new(&self.config.binary)
            .arg("serve")
            .arg("--host")
            .arg(&self.config.host)
            .arg("--port")
            .arg(self.config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!("could not start agent-shell: {e}");
                self.available.store(false, Ordering::SeqCst);
                return false;
            }
        };
        *process = Some(child);

        // Poll with the lock held so the settled flag is what concurrent
        // callers observe.
        for attempt in 1..=SPAWN_POLL_ATTEMPTS {
            sleep(SPAWN_POLL_INTERVAL).await;
            if self.probe_health().await {
                info!(attempts = attempt, "agent-shell is healthy");
                self.available.store(true, Ordering::SeqCst);
                return true;
            }
            debug!(attempt, "agent-shell not healthy yet");
        }

        warn!("agent-shell started but did not pass health checks; assuming it is still loading");
        self.available.store(true, Ordering::SeqCst);
        true
    }

    async fn probe_health(&self) -> bool {
        let url = format!("{}/health", self.base_url());
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Stop the spawned sidecar, if we own one. Graceful first (SIGTERM,
    /// bounded wait), then a hard kill. Safe to call more than once.
    pub async fn stop(&self) {
        let child = self.process.lock().await.take();
        let Some(mut child) = child else {
            return;
        };
        self.available.store(false, Ordering::SeqCst);

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            info!(pid, "stopping agent-shell");
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            match timeout(STOP_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(%status, "agent-shell exited");
                    return;
                }
                Ok(Err(e)) => warn!("waiting for agent-shell failed: {e}"),
                Err(_) => warn!("agent-shell ignored SIGTERM; killing"),
            }
        }

        if let Err(e) = child.kill().await {
            warn!("could not kill agent-shell: {e}");
        }
    }
}
