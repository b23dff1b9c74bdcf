//! POSIX signal handling for `run`: first `SIGINT`/`SIGTERM` triggers
//! graceful shutdown, a second forces immediate exit.

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::warn;

/// A pair of installed `SIGINT`/`SIGTERM` listeners, reusable across more
/// than one wait so a second delivery during shutdown can still be
/// observed by the same process.
///
/// Installed only for the duration of `run`: before `run`, signals use
/// the default disposition; once this value is dropped, the underlying
/// handlers are torn down with it.
pub(crate) struct TerminateSignal {
    sigint: Option<Signal>,
    sigterm: Option<Signal>,
}

impl TerminateSignal {
    pub(crate) fn new() -> Self {
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| warn!(error = %e, "failed to install SIGINT handler"))
            .ok();
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| warn!(error = %e, "failed to install SIGTERM handler"))
            .ok();
        Self { sigint, sigterm }
    }

    /// Waits for the next `SIGINT` or `SIGTERM` delivery. If neither
    /// handler installed successfully, never resolves.
    pub(crate) async fn recv(&mut self) {
        match (self.sigint.as_mut(), self.sigterm.as_mut()) {
            (Some(sigint), Some(sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            (Some(sigint), None) => {
                sigint.recv().await;
            }
            (None, Some(sigterm)) => {
                sigterm.recv().await;
            }
            (None, None) => std::future::pending::<()>().await,
        }
    }
}
