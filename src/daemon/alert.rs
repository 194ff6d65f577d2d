//! Alert threshold edge detection.

use crate::types::AlertThresholds;

/// Decides whether an alert fires for this reading.
///
/// `previous` is the remaining time seen by the previous tick (`None` right
/// after a start or level change). An alert fires on the falling edge only:
///
/// - an unchanged reading never fires, so a clock sitting on a threshold
///   stays quiet;
/// - a falling reading fires for thresholds `t` with `current <= t < previous`,
///   and when a coarse step crosses several of them the smallest one wins;
/// - with no previous reading, or after time went up, only an exact match
///   with `current` fires.
pub fn should_fire(
    previous: Option<u32>,
    current: u32,
    thresholds: &AlertThresholds,
) -> Option<u32> {
    match previous {
        Some(prev) if prev == current => None,
        Some(prev) if prev > current => thresholds
            .as_slice()
            .iter()
            .rev()
            .copied()
            .find(|t| *t >= current && *t < prev),
        _ => thresholds.contains(current).then_some(current),
    }
}
