//! Availability prober: pings the backend and flushes the queue when it answers.
//!
//! DESIGN
//! ======
//! One probe runs immediately on spawn, then one per interval (default five
//! minutes). A failed ping is logged and the task waits for the next tick:
//! no backoff, no jitter. Missed ticks are skipped rather than bunched up.
//! The task lives as long as its `Prober` handle; dropping or stopping the
//! handle aborts it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::queue::{FlushReport, SubmissionQueue};
use crate::transport::Transport;

/// What a single probe cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The ping failed; the queue was left alone.
    Unreachable,
    /// The ping succeeded and the queue was flushed.
    Flushed(FlushReport),
}

/// Ping once; on success flush the queue.
pub async fn probe_once(queue: &SubmissionQueue, transport: &dyn Transport) -> ProbeOutcome {
    match transport.ping().await {
        Ok(()) => {
            debug!("backend reachable; flushing submission queue");
            ProbeOutcome::Flushed(queue.flush().await)
        }
        Err(e) => {
            warn!(error = %e, "backend ping failed; will retry next interval");
            ProbeOutcome::Unreachable
        }
    }
}

/// Handle to the background probe task.
pub struct Prober {
    handle: JoinHandle<()>,
}

impl Prober {
    /// Spawn the probe loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(queue: Arc<SubmissionQueue>, transport: Arc<dyn Transport>, interval: Duration) -> Self {
        info!(interval_secs = interval.as_secs(), "availability prober started");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                probe_once(&queue, transport.as_ref()).await;
            }
        });
        Self { handle }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the timer. An in-flight probe is dropped at its next await.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Prober {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("availability prober stopped");
    }
}

#[cfg(test)]
#[path = "prober_test.rs"]
mod tests;
