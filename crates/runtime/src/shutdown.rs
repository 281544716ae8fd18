use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use futures::FutureExt;
use tokio::signal::unix::{Signal, SignalKind};
use tracing::{debug, warn};

/// A `ShutdownSignal` is an helper struct that listens for various shutdown signals sources.
pub struct ShutdownSignal {
    /// A future that resolves when a SIGINT signal is received.
    ctrl_c: Pin<Box<dyn Future<Output = io::Result<()>> + Send>>,
    /// A future that resolves when a SIGTERM signal is received.
    term_signal: Signal,
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal").finish_non_exhaustive()
    }
}

impl ShutdownSignal {
    /// Install the SIGINT and SIGTERM listeners.
    pub fn new() -> io::Result<Self> {
        let ctrl_c = Box::pin(tokio::signal::ctrl_c());
        let term_signal = tokio::signal::unix::signal(SignalKind::terminate())?;

        Ok(Self { ctrl_c, term_signal })
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.ctrl_c.poll_unpin(cx).is_ready() {
            debug!("Received SIGINT signal");
            return Poll::Ready(());
        }

        if this.term_signal.poll_recv(cx).is_ready() {
            debug!("Received SIGTERM signal");
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

/// Run `fut` until it completes or `shutdown` resolves.
///
/// On shutdown `on_shutdown` runs and `fut` gets `grace` to finish on its own. If it does
/// not, the process exits with status 1, aborting any in-flight work.
pub async fn run_until_shutdown_graceful<F, S, O, C>(
    fut: F,
    shutdown: S,
    grace: Duration,
    on_shutdown: C,
) -> O
where
    F: Future<Output = O>,
    S: Future<Output = ()>,
    C: FnOnce(),
{
    let mut fut = Box::pin(fut);

    tokio::select! {
        result = &mut fut => result,
        _ = shutdown => {
            on_shutdown();
            debug!("Shutdown signal received, waiting for graceful completion");

            tokio::select! {
                result = &mut fut => {
                    debug!("Graceful shutdown completed successfully");
                    result
                },
                _ = tokio::time::sleep(grace) => {
                    warn!("Graceful shutdown timeout exceeded, forcing exit");
                    std::process::exit(1);
                }
            }
        }
    }
}
