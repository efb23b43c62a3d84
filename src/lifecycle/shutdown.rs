//! Shutdown coordination for long-running commands.

use std::sync::Arc;
use tokio::sync::watch;

/// Latched stop request shared by every task of a command.
///
/// Backed by a watch channel, so a subscriber created after the trigger
/// still observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is triggered (immediately if it already was).
    pub async fn recv(&mut self) {
        // A dropped coordinator counts as a stop request.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
