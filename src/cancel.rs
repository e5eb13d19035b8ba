use crate::{ChartmetricError, Result};
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation for long-running collections.
///
/// - `cancel()` flips a boolean and wakes sleepers.
/// - `reset()` clears the flag so future runs can proceed.
/// - Throttle sleeps select on either the timer or cancellation.
#[derive(Clone, Debug)]
pub struct CancellationState {
    tx: watch::Sender<bool>,
}

impl Default for CancellationState {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        // send_replace stores the value even with no receivers alive
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Sleep for `duration` unless cancellation is requested first.
pub async fn sleep_with_cancel(
    mut cancel_rx: watch::Receiver<bool>,
    duration: Duration,
) -> Result<()> {
    if *cancel_rx.borrow() {
        return Err(ChartmetricError::Cancelled);
    }

    let sleeper = tokio::time::sleep(duration);
    tokio::pin!(sleeper);
    tokio::select! {
        _ = &mut sleeper => Ok(()),
        _ = async {
            loop {
                if cancel_rx.changed().await.is_err() {
                    // Sender dropped; nothing can cancel us any more.
                    std::future::pending::<()>().await;
                }
                if *cancel_rx.borrow() {
                    break;
                }
            }
        } => Err(ChartmetricError::Cancelled),
    }
}
