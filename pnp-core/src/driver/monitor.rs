//! Background status polling.
//!
//! Periodically reads the controller's status document through the shared
//! command channel and feeds it to the [`MovementTracker`], so pending
//! moves resolve even when the controller never pushes a report.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::driver::pending::MovementTracker;

/// Handle to a running status poller.
pub struct StatusMonitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusMonitor {
    /// Start polling `path` every `interval`.
    pub fn spawn(
        channel: Arc<CommandChannel>,
        tracker: Arc<MovementTracker>,
        path: String,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            debug!(%path, ?interval, "status monitor started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let polled = tokio::select! {
                    _ = token.cancelled() => break,
                    res = channel.get(&path) => res,
                };
                match polled {
                    Ok(resp) => {
                        tracker.process_status_report(&resp.body);
                    }
                    Err(e) => warn!("status poll failed: {e}"),
                }
            }
            debug!("status monitor stopped");
        });

        Self { cancel, handle }
    }

    /// Cancel the poller and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("status monitor task failed: {e}");
        }
    }
}
