//! Keepalive timer.
//!
//! [`Keepalive`] runs a background task that enqueues one
//! [`RtmMessage::Ping`] per interval, first one interval after start. It
//! never writes to the socket itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::messages::RtmMessage;
use super::outbound::OutboundHandle;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running keepalive task.
#[derive(Debug)]
pub struct Keepalive {
    task: Option<JoinHandle<()>>,
    fired: Arc<AtomicU64>,
}

impl Keepalive {
    /// Starts the timer. Must be called from within a Tokio runtime.
    ///
    /// A zero interval is raised to one millisecond.
    #[must_use]
    pub fn start(interval: Duration, outbound: OutboundHandle) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let fired = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&fired);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if outbound.enqueue(RtmMessage::Ping).await.is_err() {
                    debug!("outbound queue closed, keepalive exiting");
                    break;
                }
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(n, "keepalive enqueued");
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "keepalive started");
        Self {
            task: Some(task),
            fired,
        }
    }

    /// Stops the timer.
    ///
    /// Returns `true` on the call that actually stopped it; later calls
    /// are no-ops returning `false`.
    pub fn stop(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        task.abort();
        debug!(fired = self.fired(), "keepalive stopped");
        true
    }

    /// Returns `true` until [`Keepalive::stop`] has been called.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Number of pings enqueued so far.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
