//! Alert threshold set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce;

/// Default alert thresholds in seconds remaining
pub const DEFAULT_ALERT_SECONDS: [u32; 2] = [60, 10];

/// Distinct positive seconds-remaining values, sorted descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct AlertThresholds(Vec<u32>);

impl AlertThresholds {
    /// Builds a threshold set from integer seconds, dropping zeros and duplicates.
    pub fn from_seconds(seconds: impl IntoIterator<Item = u32>) -> Self {
        let mut values: Vec<u32> = seconds.into_iter().filter(|s| *s > 0).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        values.dedup();
        Self(values)
    }

    /// Builds a threshold set from loosely typed JSON values.
    ///
    /// Entries that are not positive numbers after flooring are dropped.
    pub fn from_raw(raw: &[Value]) -> Self {
        Self::from_seconds(raw.iter().filter_map(|value| {
            let n = coerce::number(Some(value))?.floor();
            (n >= 1.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
        }))
    }

    /// Returns the thresholds, largest first.
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Returns true when `seconds` is one of the thresholds.
    pub fn contains(&self, seconds: u32) -> bool {
        self.0.contains(&seconds)
    }

    /// Returns true when no alert is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self::from_seconds(DEFAULT_ALERT_SECONDS)
    }
}

impl From<Vec<u32>> for AlertThresholds {
    fn from(seconds: Vec<u32>) -> Self {
        Self::from_seconds(seconds)
    }
}

impl From<AlertThresholds> for Vec<u32> {
    fn from(thresholds: AlertThresholds) -> Self {
        thresholds.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default() {
        assert_eq!(AlertThresholds::default().as_slice(), &[60, 10]);
    }

    #[test]
    fn test_sorted_descending_and_deduplicated() {
        let thresholds = AlertThresholds::from_seconds([10, 60, 10, 120, 0]);
        assert_eq!(thresholds.as_slice(), &[120, 60, 10]);
    }

    #[test]
    fn test_from_raw_drops_invalid_entries() {
        let raw = vec![
            json!(30),
            json!("90"),
            json!(-5),
            json!(0),
            json!(0.5),
            json!("abc"),
            json!(null),
            json!(10.9),
            json!(30),
        ];
        let thresholds = AlertThresholds::from_raw(&raw);
        assert_eq!(thresholds.as_slice(), &[90, 30, 10]);
    }

    #[test]
    fn test_empty_is_allowed() {
        let thresholds = AlertThresholds::from_raw(&[]);
        assert!(thresholds.is_empty());
    }

    #[test]
    fn test_deserialize_normalizes() {
        let thresholds: AlertThresholds = serde_json::from_str("[10, 60, 60]").unwrap();
        assert_eq!(thresholds.as_slice(), &[60, 10]);
        assert!(thresholds.contains(60));
        assert!(!thresholds.contains(30));
    }
}
