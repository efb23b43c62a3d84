//! OS signal handling.
//!
//! The first SIGINT/SIGTERM asks for a graceful stop through [`Shutdown`];
//! the second exits the process with status 130.

use tokio::signal;

use crate::lifecycle::shutdown::Shutdown;

/// Install the handler on a background task.
pub fn spawn_signal_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown requested, finishing current work");
        shutdown.trigger();

        wait_for_signal().await;
        tracing::warn!("second signal received, exiting immediately");
        std::process::exit(130);
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = signal::ctrl_c().await;
}
