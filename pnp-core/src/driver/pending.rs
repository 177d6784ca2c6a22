//! Move completion tracking.
//!
//! A [`PendingMove`] is taken *before* a home/move is dispatched, so a
//! status report that lands between dispatch and response still counts.
//! Waiting is bounded and ends early when the session is torn down.

use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{DriverError, Result};

/// `stat` value reported by the controller when motion has finished.
pub const STAT_MOTION_COMPLETE: i64 = 3;

/// Broadcasts move completions to every waiter.
#[derive(Debug)]
pub struct MovementTracker {
    completions: watch::Sender<u64>,
    cancel: Mutex<CancellationToken>,
}

impl Default for MovementTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementTracker {
    pub fn new() -> Self {
        let (completions, _) = watch::channel(0);
        Self {
            completions,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Take a completion ticket for a command about to be sent.
    pub fn begin(&self) -> PendingMove {
        let rx = self.completions.subscribe();
        let start = *rx.borrow();
        PendingMove {
            rx,
            start,
            cancel: self.cancel.lock().clone(),
        }
    }

    /// Resolve every outstanding [`PendingMove`].
    pub fn notify_complete(&self) {
        self.completions.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Inspect a status report; a motion-complete `stat` resolves waiters.
    ///
    /// `stat` is looked up at the top level and under `"r"`.
    pub fn process_status_report(&self, report: &Value) -> bool {
        let stat = report
            .get("stat")
            .or_else(|| report.get("r").and_then(|r| r.get("stat")))
            .and_then(Value::as_i64);

        trace!(?stat, "status report");
        if stat == Some(STAT_MOTION_COMPLETE) {
            debug!("motion complete");
            self.notify_complete();
            true
        } else {
            false
        }
    }

    /// Fail every outstanding wait with `Cancelled`. Later tickets are
    /// unaffected.
    pub fn cancel_all(&self) {
        let mut token = self.cancel.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    /// Number of completions seen so far.
    pub fn completed(&self) -> u64 {
        *self.completions.borrow()
    }
}

/// A ticket resolved by the next completion after it was taken.
#[derive(Debug)]
pub struct PendingMove {
    rx: watch::Receiver<u64>,
    start: u64,
    cancel: CancellationToken,
}

impl PendingMove {
    /// Wait for a completion, at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<()> {
        let cancel = self.cancel.clone();
        let start = self.start;
        let rx = &mut self.rx;

        let completed = async move {
            loop {
                if *rx.borrow_and_update() != start {
                    return Ok(());
                }
                if rx.changed().await.is_err() {
                    return Err(DriverError::Cancelled);
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(DriverError::Cancelled),
            res = tokio::time::timeout(timeout, completed) => match res {
                Ok(inner) => inner,
                Err(_) => Err(DriverError::CommandTimedOut(timeout)),
            },
        }
    }
}
