//! Levels, schedules and their normalization.
//!
//! Every `Level` held by the clock has been through `LevelNormalizer`, so the
//! rest of the crate can rely on non-negative blinds and a duration that
//! respects the configured floor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce;

/// Minimum level duration in seconds
pub const MIN_LEVEL_SECONDS: u32 = 60;

/// Duration used when a level carries no usable duration
pub const FALLBACK_LEVEL_SECONDS: u32 = 600;

// ============================================================================
// Level
// ============================================================================

/// One timed stage of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    /// Total time allotted to this level
    pub duration_seconds: u32,
    /// Small blind (stored but meaningless on breaks)
    pub small_blind: u64,
    /// Big blind (stored but meaningless on breaks)
    pub big_blind: u64,
    /// Ante (stored but meaningless on breaks)
    pub ante: u64,
    /// Whether this level is a break
    pub is_break: bool,
}

impl Level {
    /// Creates a playing level.
    pub fn play(duration_seconds: u32, small_blind: u64, big_blind: u64, ante: u64) -> Self {
        Self {
            duration_seconds,
            small_blind,
            big_blind,
            ante,
            is_break: false,
        }
    }

    /// Creates a break level.
    pub fn break_level(duration_seconds: u32) -> Self {
        Self {
            duration_seconds,
            small_blind: 0,
            big_blind: 0,
            ante: 0,
            is_break: true,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Ordered, non-empty sequence of levels in play order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Level>", into = "Vec<Level>")]
pub struct Schedule(Vec<Level>);

/// Error returned when building a schedule from an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a schedule needs at least one level")]
pub struct EmptySchedule;

impl TryFrom<Vec<Level>> for Schedule {
    type Error = EmptySchedule;

    fn try_from(levels: Vec<Level>) -> Result<Self, Self::Error> {
        if levels.is_empty() {
            return Err(EmptySchedule);
        }
        Ok(Self(levels))
    }
}

impl From<Schedule> for Vec<Level> {
    fn from(schedule: Schedule) -> Self {
        schedule.0
    }
}

impl Default for Schedule {
    /// Three 20-minute levels.
    fn default() -> Self {
        Self(vec![
            Level::play(1200, 100, 200, 0),
            Level::play(1200, 100, 300, 0),
            Level::play(1200, 200, 400, 0),
        ])
    }
}

impl Schedule {
    /// Returns the levels in play order.
    pub fn levels(&self) -> &[Level] {
        &self.0
    }

    /// Returns the level at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Level> {
        self.0.get(index)
    }

    /// Returns the first level.
    pub fn first(&self) -> &Level {
        &self.0[0]
    }

    /// Returns the number of levels (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the index of the last level.
    pub fn last_index(&self) -> usize {
        self.0.len() - 1
    }
}

// ============================================================================
// LevelNormalizer
// ============================================================================

/// Coerces raw level descriptors into canonical `Level`s.
///
/// Raw levels are JSON objects. Both the canonical camelCase keys
/// (`durationSeconds`, `smallBlind`, `bigBlind`) and the short keys used by
/// older admin panels (`durationSec`, `sb`, `bb`) are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelNormalizer {
    min_duration_seconds: u32,
    fallback_duration_seconds: u32,
}

impl Default for LevelNormalizer {
    fn default() -> Self {
        Self::new(MIN_LEVEL_SECONDS, FALLBACK_LEVEL_SECONDS)
    }
}

impl LevelNormalizer {
    /// Creates a normalizer with the given duration floor and fallback.
    ///
    /// The fallback is raised to the floor if it sits below it.
    pub fn new(min_duration_seconds: u32, fallback_duration_seconds: u32) -> Self {
        Self {
            min_duration_seconds,
            fallback_duration_seconds: fallback_duration_seconds.max(min_duration_seconds),
        }
    }

    /// Returns the duration floor.
    pub fn min_duration_seconds(&self) -> u32 {
        self.min_duration_seconds
    }

    /// Normalizes one raw level. Never fails.
    pub fn normalize(&self, raw: &Value) -> Level {
        let duration = coerce::number(coerce::field(raw, &["durationSeconds", "durationSec"]))
            .unwrap_or(f64::from(self.fallback_duration_seconds));

        let chips = |keys: &[&str]| {
            coerce::number(coerce::field(raw, keys))
                .map(coerce::floor_u64)
                .unwrap_or(0)
        };

        Level {
            duration_seconds: coerce::floor_u32(duration, self.min_duration_seconds),
            small_blind: chips(&["smallBlind", "sb"]),
            big_blind: chips(&["bigBlind", "bb"]),
            ante: chips(&["ante"]),
            is_break: coerce::truthy(raw.get("isBreak")),
        }
    }

    /// Re-applies the duration floor to an already typed level.
    pub fn clamp(&self, level: Level) -> Level {
        Level {
            duration_seconds: level.duration_seconds.max(self.min_duration_seconds),
            ..level
        }
    }

    /// Normalizes a raw schedule.
    ///
    /// Anything other than a non-empty JSON array yields a single fallback level.
    pub fn normalize_schedule(&self, raw: &Value) -> Schedule {
        match raw.as_array() {
            Some(items) if !items.is_empty() => {
                Schedule(items.iter().map(|item| self.normalize(item)).collect())
            }
            _ => Schedule(vec![self.fallback_level()]),
        }
    }

    /// Re-applies the duration floor to every level of a typed schedule.
    pub fn clamp_schedule(&self, schedule: Schedule) -> Schedule {
        Schedule(schedule.0.into_iter().map(|l| self.clamp(l)).collect())
    }

    /// The level substituted for an empty or malformed schedule.
    pub fn fallback_level(&self) -> Level {
        Level::play(self.fallback_duration_seconds, 100, 200, 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_well_formed_level() {
            let level = LevelNormalizer::default().normalize(&json!({
                "durationSeconds": 900,
                "smallBlind": 100,
                "bigBlind": 200,
                "ante": 25,
                "isBreak": false
            }));

            assert_eq!(level, Level::play(900, 100, 200, 25));
        }

        #[test]
        fn test_short_keys() {
            let level = LevelNormalizer::default().normalize(&json!({
                "durationSec": 1200,
                "sb": 300,
                "bb": 600,
                "ante": 50
            }));

            assert_eq!(level, Level::play(1200, 300, 600, 50));
        }

        #[test]
        fn test_missing_fields_take_fallbacks() {
            let level = LevelNormalizer::default().normalize(&json!({}));

            assert_eq!(level.duration_seconds, FALLBACK_LEVEL_SECONDS);
            assert_eq!(level.small_blind, 0);
            assert_eq!(level.big_blind, 0);
            assert_eq!(level.ante, 0);
            assert!(!level.is_break);
        }

        #[test]
        fn test_duration_floor() {
            let normalizer = LevelNormalizer::default();

            let level = normalizer.normalize(&json!({"durationSeconds": 10}));
            assert_eq!(level.duration_seconds, MIN_LEVEL_SECONDS);

            let level = normalizer.normalize(&json!({"durationSeconds": 0}));
            assert_eq!(level.duration_seconds, MIN_LEVEL_SECONDS);
        }

        #[test]
        fn test_fractional_and_string_values_are_floored() {
            let level = LevelNormalizer::default().normalize(&json!({
                "durationSeconds": "615.9",
                "smallBlind": 99.99,
                "bigBlind": "200",
                "ante": -40
            }));

            assert_eq!(level.duration_seconds, 615);
            assert_eq!(level.small_blind, 99);
            assert_eq!(level.big_blind, 200);
            assert_eq!(level.ante, 0);
        }

        #[test]
        fn test_non_numeric_duration_takes_fallback() {
            let level = LevelNormalizer::default().normalize(&json!({"durationSeconds": "soon"}));
            assert_eq!(level.duration_seconds, FALLBACK_LEVEL_SECONDS);
        }

        #[test]
        fn test_is_break_coercion() {
            let normalizer = LevelNormalizer::default();
            assert!(normalizer.normalize(&json!({"isBreak": true})).is_break);
            assert!(normalizer.normalize(&json!({"isBreak": 1})).is_break);
            assert!(normalizer.normalize(&json!({"isBreak": "yes"})).is_break);
            assert!(!normalizer.normalize(&json!({"isBreak": 0})).is_break);
            assert!(!normalizer.normalize(&json!({"isBreak": null})).is_break);
        }

        #[test]
        fn test_non_object_input() {
            let level = LevelNormalizer::default().normalize(&json!(42));
            assert_eq!(level.duration_seconds, FALLBACK_LEVEL_SECONDS);
        }

        #[test]
        fn test_custom_floor() {
            let normalizer = LevelNormalizer::new(120, 30);
            assert_eq!(normalizer.normalize(&json!({})).duration_seconds, 120);
            assert_eq!(
                normalizer
                    .normalize(&json!({"durationSeconds": 90}))
                    .duration_seconds,
                120
            );
        }

        #[test]
        fn test_normalize_is_idempotent() {
            let normalizer = LevelNormalizer::default();
            let inputs = [
                json!({}),
                json!(null),
                json!("level"),
                json!({"durationSeconds": 1.5, "sb": "7", "isBreak": "x"}),
                json!({"durationSec": 1e12, "bb": -3, "ante": 12.9}),
                json!({"durationSeconds": 600, "smallBlind": 25, "bigBlind": 50, "ante": 5, "isBreak": true}),
            ];

            for input in inputs {
                let once = normalizer.normalize(&input);
                let twice = normalizer.normalize(&serde_json::to_value(&once).unwrap());
                assert_eq!(once, twice, "not idempotent for {input}");
            }
        }
    }

    mod schedule_tests {
        use super::*;

        #[test]
        fn test_normalize_schedule_keeps_order() {
            let schedule = LevelNormalizer::default().normalize_schedule(&json!([
                {"durationSeconds": 120},
                {"durationSeconds": 60, "isBreak": true},
                {"durationSeconds": 180}
            ]));

            assert_eq!(schedule.len(), 3);
            assert_eq!(schedule.levels()[0].duration_seconds, 120);
            assert!(schedule.levels()[1].is_break);
            assert_eq!(schedule.levels()[2].duration_seconds, 180);
            assert_eq!(schedule.last_index(), 2);
        }

        #[test]
        fn test_empty_schedule_gets_fallback_level() {
            let normalizer = LevelNormalizer::default();

            for raw in [json!([]), json!(null), json!({"levels": []}), json!("x")] {
                let schedule = normalizer.normalize_schedule(&raw);
                assert_eq!(schedule.len(), 1);
                assert_eq!(*schedule.first(), normalizer.fallback_level());
            }
        }

        #[test]
        fn test_default_schedule() {
            let schedule = Schedule::default();
            assert_eq!(schedule.len(), 3);
            assert!(schedule.levels().iter().all(|l| l.duration_seconds == 1200));
        }

        #[test]
        fn test_deserialize_rejects_empty() {
            let result: Result<Schedule, _> = serde_json::from_str("[]");
            assert!(result.is_err());
        }

        #[test]
        fn test_serialize_as_plain_array() {
            let schedule = Schedule::try_from(vec![Level::break_level(300)]).unwrap();
            let json = serde_json::to_value(&schedule).unwrap();
            assert_eq!(
                json,
                json!([{
                    "durationSeconds": 300,
                    "smallBlind": 0,
                    "bigBlind": 0,
                    "ante": 0,
                    "isBreak": true
                }])
            );
        }

        #[test]
        fn test_clamp_schedule() {
            let schedule = Schedule::try_from(vec![Level::play(10, 1, 2, 0)]).unwrap();
            let clamped = LevelNormalizer::default().clamp_schedule(schedule);
            assert_eq!(clamped.first().duration_seconds, MIN_LEVEL_SECONDS);
        }
    }
}
