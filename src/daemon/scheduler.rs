//! Periodic tick scheduler.
//!
//! A `Ticker` owns one background task that wakes on a fixed period and asks
//! its target to re-evaluate the clock. The task is aborted when the ticker is
//! dropped, so holding at most one `Ticker` guarantees at most one live tick
//! loop.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// Tickable
// ============================================================================

/// Receiver of scheduler ticks.
pub trait Tickable: Send + Sync + 'static {
    /// Called once per period. `anchor` identifies the run segment the ticker
    /// was started for, so stale ticks can be told apart from current ones.
    fn on_tick(&self, anchor: Instant, now: Instant) -> impl std::future::Future<Output = ()> + Send;
}

// ============================================================================
// Ticker
// ============================================================================

/// Handle to a running tick loop.
#[derive(Debug)]
pub struct Ticker {
    /// Run segment start the loop is aligned to
    anchor: Instant,
    /// Background task
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns a tick loop aligned to `anchor`.
    ///
    /// Ticks land at `anchor + k * period` so whole-second boundaries of the
    /// run segment are observed promptly. Late wakeups are skipped rather
    /// than bursted. The loop ends when `target` is gone.
    pub fn spawn<T: Tickable>(target: Weak<T>, anchor: Instant, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(anchor + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let now = interval.tick().await;
                let Some(target) = target.upgrade() else {
                    tracing::debug!("Tick target dropped, stopping ticker");
                    break;
                };
                target.on_tick(anchor, now).await;
            }
        });

        tracing::debug!("Ticker started (period: {:?})", period);
        Self { anchor, handle }
    }

    /// Returns the run segment start this ticker is aligned to.
    pub fn anchor(&self) -> Instant {
        self.anchor
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
