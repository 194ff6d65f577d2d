//! Wall-clock based remaining-time computation.
//!
//! Remaining time is always derived from absolute instants, never decremented
//! per tick, so late or skipped scheduler wakeups self-correct on the next
//! evaluation.

use tokio::time::Instant;

use crate::types::Level;

/// Returns the seconds left in `level`.
///
/// When `run_started_at` is `None` the clock is not running and only the
/// paused offset counts. Otherwise elapsed time is the whole seconds since
/// `run_started_at` plus the paused offset.
pub fn remaining_now(
    level: &Level,
    run_started_at: Option<Instant>,
    paused_offset_seconds: u32,
    now: Instant,
) -> u32 {
    let running_seconds = run_started_at
        .map(|start| now.saturating_duration_since(start).as_secs())
        .unwrap_or(0);

    let elapsed = running_seconds.saturating_add(u64::from(paused_offset_seconds));
    let remaining = u64::from(level.duration_seconds).saturating_sub(elapsed);

    // remaining <= duration_seconds, so it always fits
    u32::try_from(remaining).unwrap_or(0)
}
