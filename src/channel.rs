//! Channel runtime — shared scaffolding for the front-end surfaces.
//!
//! A [`Channel`] is an independently-runnable unit that talks to the user:
//! the HTTP server, or the interactive console. Channels capture their
//! shared state at construction time, then `main` hands them to
//! [`spawn_channels`] which runs them concurrently. Any channel error
//! cancels the shared [`CancellationToken`] so siblings shut down cleanly.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

/// A boxed, owned future returned by [`Channel::run`].
pub type ChannelFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable front-end surface.
pub trait Channel: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the channel and return its async run-loop as a boxed future.
    ///
    /// The future should run until `shutdown` is cancelled or the channel's
    /// own work is done (e.g. console EOF).
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture;
}

/// Handle to the running channel set.
///
/// `.await` via [`ChannelSet::join`] blocks until every channel has exited
/// and returns the first error, if any.
pub struct ChannelSet {
    inner: JoinHandle<Result<(), AppError>>,
}

impl ChannelSet {
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Server(format!("channel task panicked: {e}"))),
        }
    }
}

/// Spawn each [`Channel`] as an independent Tokio task.
///
/// If any channel returns `Err`, `shutdown` is cancelled so the others stop
/// cooperatively; the first error is reported from [`ChannelSet::join`].
pub fn spawn_channels(channels: Vec<Box<dyn Channel>>, shutdown: CancellationToken) -> ChannelSet {
    let inner = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for channel in channels {
            let id = channel.id().to_string();
            debug!(channel = %id, "spawning channel");
            set.spawn(channel.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            // A panic is reported the same way as a returned error.
            let outcome =
                res.unwrap_or_else(|e| Err(AppError::Server(format!("channel panicked: {e}"))));
            if let Err(e) = outcome {
                error!("channel failed: {e}");
                shutdown.cancel();
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    });

    ChannelSet { inner }
}
