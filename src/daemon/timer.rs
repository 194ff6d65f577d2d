//! Timer engine for the blind clock.
//!
//! This module provides the level/timer state machine:
//! - State transitions (Stopped → Running ⇄ Paused, reset, level navigation)
//! - Auto-advance when a level expires, including end-of-schedule handling
//! - Alert edge detection on each scheduler tick
//! - Ordered side-effect signals returned from every call
//!
//! The engine never reads the clock itself; callers pass `now`. It never
//! fails either: commands that make no sense in the current state are
//! reported as not applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::types::{
    AlertThresholds, ClockConfig, LevelNormalizer, Schedule, TimerState, TimerStatus,
};

use super::alert::should_fire;
use super::clock::remaining_now;

// ============================================================================
// ClockSignal
// ============================================================================

/// What initiated a level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    /// The level ran out
    Auto,
    /// An operator asked for next/previous
    Manual,
}

/// Side-effect signals produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClockSignal {
    /// The current level index changed
    LevelChanged {
        /// Previous level index
        from: usize,
        /// New level index
        to: usize,
        /// What caused the change
        navigation: Navigation,
    },
    /// Moved from a playing level onto a break
    BreakEntered {
        /// The break's level index
        level_index: usize,
    },
    /// Moved from a break onto a playing level
    BreakExited {
        /// The new level index
        level_index: usize,
    },
    /// Remaining time crossed an alert threshold
    Alert {
        /// Threshold crossed, in seconds
        threshold: u32,
        /// Level being counted down
        level_index: usize,
    },
    /// Advanced past the last level; the clock stopped
    EventComplete {
        /// Index of the last level
        level_index: usize,
    },
}

// ============================================================================
// Transition
// ============================================================================

/// Result of an engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Whether the state was mutated
    pub applied: bool,
    /// Signals in emission order
    pub signals: Vec<ClockSignal>,
}

impl Transition {
    /// A command that changed nothing.
    pub fn ignored() -> Self {
        Self::default()
    }

    /// A command that changed state without signals.
    pub fn applied() -> Self {
        Self {
            applied: true,
            signals: Vec::new(),
        }
    }

    fn with_signals(signals: Vec<ClockSignal>) -> Self {
        Self {
            applied: true,
            signals,
        }
    }

    /// Returns true if an `EventComplete` signal was emitted.
    pub fn completed_event(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s, ClockSignal::EventComplete { .. }))
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Level/timer state machine. Sole mutator of `TimerState`.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    /// Current clock state
    state: TimerState,
    /// Normalizer applied to every schedule installed
    normalizer: LevelNormalizer,
}

impl TimerEngine {
    /// Creates a stopped engine at the first level of `schedule`.
    pub fn new(
        schedule: Schedule,
        alert_thresholds: AlertThresholds,
        normalizer: LevelNormalizer,
    ) -> Self {
        let schedule = normalizer.clamp_schedule(schedule);
        Self {
            state: TimerState::new(schedule, alert_thresholds),
            normalizer,
        }
    }

    /// Creates an engine from daemon configuration.
    pub fn from_config(config: &ClockConfig) -> Self {
        Self::new(
            config.initial_schedule(),
            config.initial_alert_thresholds(),
            config.normalizer(),
        )
    }

    /// Returns a reference to the current clock state.
    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Returns the remaining time of the current level at `now`.
    pub fn remaining_at(&self, now: Instant) -> u32 {
        remaining_now(
            self.state.current_level(),
            self.state.run_started_at,
            self.state.paused_offset_seconds,
            now,
        )
    }

    /// Starts the current level with a fresh countdown.
    ///
    /// Works from any status; a paused level is restarted, not resumed.
    pub fn start(&mut self, now: Instant) -> Transition {
        let state = &mut self.state;
        state.status = TimerStatus::Running;
        state.run_started_at = Some(now);
        state.paused_offset_seconds = 0;
        state.remaining_seconds = state.current_level().duration_seconds;
        state.last_observed_remaining = None;

        Transition::applied()
    }

    /// Pauses a running clock, keeping the time already consumed.
    pub fn pause(&mut self, now: Instant) -> Transition {
        match self.state.status {
            TimerStatus::Running => {
                let remaining = self.remaining_at(now);
                let state = &mut self.state;
                state.remaining_seconds = remaining;
                state.paused_offset_seconds =
                    state.current_level().duration_seconds.saturating_sub(remaining);
                state.run_started_at = None;
                state.status = TimerStatus::Paused;
                Transition::applied()
            }
            TimerStatus::Stopped | TimerStatus::Paused => Transition::ignored(),
        }
    }

    /// Resumes a paused clock where it left off.
    pub fn resume(&mut self, now: Instant) -> Transition {
        match self.state.status {
            TimerStatus::Paused => {
                self.state.status = TimerStatus::Running;
                self.state.run_started_at = Some(now);
                Transition::applied()
            }
            TimerStatus::Stopped | TimerStatus::Running => Transition::ignored(),
        }
    }

    /// Returns to the first level, stopped. Emits no signals.
    pub fn reset(&mut self) -> Transition {
        let state = &mut self.state;
        state.status = TimerStatus::Stopped;
        state.current_level_index = 0;
        state.run_started_at = None;
        state.paused_offset_seconds = 0;
        state.remaining_seconds = state.schedule.first().duration_seconds;
        state.last_observed_remaining = None;

        Transition::applied()
    }

    /// Advances to the next level (manual navigation).
    pub fn next_level(&mut self, now: Instant) -> Transition {
        let target = self.state.current_level_index as i64 + 1;
        self.goto_level(target, Navigation::Manual, now)
    }

    /// Goes back to the previous level (manual navigation).
    pub fn prev_level(&mut self, now: Instant) -> Transition {
        let target = self.state.current_level_index as i64 - 1;
        self.goto_level(target, Navigation::Manual, now)
    }

    /// Moves to level `target`.
    ///
    /// Negative targets clamp to the first level. Targets past the last level
    /// clamp to it and stop the clock (event complete). A running clock gets a
    /// fresh countdown on the new level; a paused one stays paused at its full
    /// duration. Level/break signals are only emitted when the index changes.
    pub fn goto_level(&mut self, target: i64, navigation: Navigation, now: Instant) -> Transition {
        let from = self.state.current_level_index;
        let last = self.state.schedule.last_index();
        let past_end = usize::try_from(target).map_or(false, |t| t > last);
        let to = if past_end {
            last
        } else {
            usize::try_from(target).unwrap_or(0)
        };

        let was_break = self.state.current_level().is_break;

        let state = &mut self.state;
        state.current_level_index = to;
        state.remaining_seconds = state.current_level().duration_seconds;
        state.paused_offset_seconds = 0;
        state.last_observed_remaining = None;

        if past_end {
            state.status = TimerStatus::Stopped;
            state.run_started_at = None;
        } else {
            state.run_started_at = match state.status {
                TimerStatus::Running => Some(now),
                TimerStatus::Stopped | TimerStatus::Paused => None,
            };
        }

        let mut signals = Vec::new();
        if from != to {
            signals.push(ClockSignal::LevelChanged {
                from,
                to,
                navigation,
            });

            let is_break = state.current_level().is_break;
            if !was_break && is_break {
                signals.push(ClockSignal::BreakEntered { level_index: to });
            } else if was_break && !is_break {
                signals.push(ClockSignal::BreakExited { level_index: to });
            }
        }
        if past_end {
            signals.push(ClockSignal::EventComplete { level_index: to });
        }

        Transition::with_signals(signals)
    }

    /// Normalizes and installs a raw schedule, then resets.
    ///
    /// Any run in progress is discarded since level boundaries may have moved.
    pub fn set_schedule(&mut self, raw: &Value) -> Transition {
        let schedule = self.normalizer.normalize_schedule(raw);
        self.install_schedule(schedule)
    }

    /// Installs an already typed schedule (re-applying the duration floor), then resets.
    pub fn install_schedule(&mut self, schedule: Schedule) -> Transition {
        self.state.schedule = self.normalizer.clamp_schedule(schedule);
        self.reset()
    }

    /// Replaces the alert thresholds. Timing is untouched.
    pub fn set_alert_thresholds(&mut self, thresholds: AlertThresholds) -> Transition {
        self.state.alert_thresholds = thresholds;
        Transition::applied()
    }

    /// Re-evaluates remaining time; called by the scheduler while running.
    ///
    /// Emits an alert when a threshold is crossed and auto-advances when the
    /// level has expired.
    pub fn tick(&mut self, now: Instant) -> Transition {
        if !self.state.is_running() {
            return Transition::ignored();
        }

        let remaining = self.remaining_at(now);
        let mut signals = Vec::new();

        if let Some(threshold) = should_fire(
            self.state.last_observed_remaining,
            remaining,
            &self.state.alert_thresholds,
        ) {
            signals.push(ClockSignal::Alert {
                threshold,
                level_index: self.state.current_level_index,
            });
        }
        self.state.last_observed_remaining = Some(remaining);

        if remaining == 0 {
            let next = self.state.current_level_index as i64 + 1;
            signals.extend(self.goto_level(next, Navigation::Auto, now).signals);
        } else {
            self.state.remaining_seconds = remaining;
        }

        Transition::with_signals(signals)
    }
}

// ============================================================================
// Tests
// ============================================================================
