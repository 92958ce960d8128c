//! # Termination signals as a cancellation source.
//!
//! [`cancel_on_signal`] spawns a watcher that cancels a [`CancellationToken`]
//! on the first termination signal: `SIGINT`, `SIGTERM` or `SIGQUIT` on unix,
//! Ctrl-C elsewhere. If the handlers cannot be installed the token is left
//! alone and a warning is logged.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `token` when the process is asked to terminate.
///
/// Abort the returned handle to stop watching.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                tracing::info!("termination signal received");
                token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "signal handlers unavailable"),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
