//! Periodic disk quota enforcement.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Background loop that runs a check at a fixed interval until cancelled.
pub(crate) struct DiskWatchdog {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DiskWatchdog {
    /// Spawn the loop. `check` receives the cancellation token so it can
    /// bail out after waiting for a lock; it returns `false` once its owner
    /// is gone, which ends the loop.
    pub fn spawn<F>(interval: Duration, check: F) -> Self
    where
        F: Fn(&CancellationToken) -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        if !check(&child) {
                            break;
                        }
                    }
                }
            }

            debug!("Disk watchdog stopped");
        });

        debug!(interval_ms = interval.as_millis() as u64, "Disk watchdog started");
        Self { token, handle }
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
