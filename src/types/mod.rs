//! Core data types for the blind clock.
//!
//! This module defines the data structures used for:
//! - Levels, schedules and their normalization
//! - Clock state and the snapshot broadcast to observers
//! - Daemon configuration and event settings
//! - IPC request/response serialization

pub mod alerts;
pub mod coerce;
pub mod config;
pub mod level;
pub mod preset;
pub mod settings;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

pub use alerts::AlertThresholds;
pub use config::{ClockConfig, ConfigError};
pub use level::{Level, LevelNormalizer, Schedule};
pub use preset::StructurePreset;
pub use settings::EventSettings;

// ============================================================================
// TimerStatus
// ============================================================================

/// Run status of the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Not counting; the current level shows its full duration
    #[default]
    Stopped,
    /// Counting down the current level
    Running,
    /// Counting suspended mid-level
    Paused,
}

impl TimerStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Stopped => "stopped",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// Canonical mutable clock state. Only `TimerEngine` mutates it.
#[derive(Debug, Clone)]
pub struct TimerState {
    /// Current run status
    pub status: TimerStatus,
    /// Index of the current level in `schedule`
    pub current_level_index: usize,
    /// Time left in the current level as of the last recomputation
    pub remaining_seconds: u32,
    /// Instant the current run segment started; `None` unless running
    pub run_started_at: Option<Instant>,
    /// Seconds of the current level consumed before `run_started_at`
    pub paused_offset_seconds: u32,
    /// Alert thresholds
    pub alert_thresholds: AlertThresholds,
    /// Remaining time seen by the previous scheduler tick
    pub last_observed_remaining: Option<u32>,
    /// Levels in play order
    pub schedule: Schedule,
}

impl TimerState {
    /// Creates a stopped state at the first level.
    pub fn new(schedule: Schedule, alert_thresholds: AlertThresholds) -> Self {
        Self {
            status: TimerStatus::Stopped,
            current_level_index: 0,
            remaining_seconds: schedule.first().duration_seconds,
            run_started_at: None,
            paused_offset_seconds: 0,
            alert_thresholds,
            last_observed_remaining: None,
            schedule,
        }
    }

    /// Returns the current level.
    pub fn current_level(&self) -> &Level {
        self.schedule
            .get(self.current_level_index)
            .unwrap_or_else(|| self.schedule.first())
    }

    /// Returns the level after the current one, if any.
    pub fn next_level(&self) -> Option<&Level> {
        self.schedule.get(self.current_level_index + 1)
    }

    /// Returns true if the clock is counting down.
    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }
}

// ============================================================================
// ClockSnapshot
// ============================================================================

/// Full clock state as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockSnapshot {
    pub status: TimerStatus,
    pub current_level_index: usize,
    pub remaining_seconds: u32,
    pub paused_offset_seconds: u32,
    pub schedule: Schedule,
    pub alert_thresholds: AlertThresholds,
    pub settings: EventSettings,
}

impl ClockSnapshot {
    /// Creates a snapshot from the clock state and the event settings.
    pub fn from_state(state: &TimerState, settings: &EventSettings) -> Self {
        Self {
            status: state.status,
            current_level_index: state.current_level_index,
            remaining_seconds: state.remaining_seconds,
            paused_offset_seconds: state.paused_offset_seconds,
            schedule: state.schedule.clone(),
            alert_thresholds: state.alert_thresholds.clone(),
            settings: settings.clone(),
        }
    }

    /// Returns the current level.
    pub fn current_level(&self) -> &Level {
        self.schedule
            .get(self.current_level_index)
            .unwrap_or_else(|| self.schedule.first())
    }

    /// Returns the level after the current one, if any.
    pub fn next_level(&self) -> Option<&Level> {
        self.schedule.get(self.current_level_index + 1)
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Start the current level from its full duration
    Start,
    /// Pause the running clock
    Pause,
    /// Resume a paused clock
    Resume,
    /// Back to level 1, stopped
    Reset,
    /// Advance to the next level
    Next,
    /// Go back to the previous level
    Prev,
    /// Query the current snapshot
    Status,
    /// Replace the schedule with raw levels
    SetSchedule {
        /// Raw level list, normalized by the daemon
        levels: Value,
    },
    /// Replace the alert thresholds
    SetAlerts {
        /// Raw seconds values; invalid entries are dropped
        seconds: Vec<Value>,
    },
    /// Merge event settings
    UpdateSettings {
        /// Partial settings object
        settings: Map<String, Value>,
    },
    /// Merge settings, install levels/alerts and reset
    Init {
        /// Settings plus optional `levels` and `alertSeconds`
        settings: Map<String, Value>,
    },
    /// Apply a built-in structure
    Preset {
        /// Preset to apply
        preset: StructurePreset,
    },
    /// Relay an ad-hoc sound cue to observers
    Sound {
        /// Cue kind, `levelChange` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        /// Sound id, taken from the sound map when absent
        #[serde(rename = "soundId", default, skip_serializing_if = "Option::is_none")]
        sound_id: Option<String>,
        /// Volume, taken from settings when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<f64>,
    },
    /// Keep the connection open and stream notifications
    Subscribe,
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Snapshot after the command was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ClockSnapshot>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ClockSnapshot>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for success responses.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ------------------------------------------------------------------------
    // TimerStatus Tests
    // ------------------------------------------------------------------------

    mod timer_status_tests {
        use super::*;

        #[test]
        fn test_default_is_stopped() {
            assert_eq!(TimerStatus::default(), TimerStatus::Stopped);
        }

        #[test]
        fn test_as_str() {
            assert_eq!(TimerStatus::Stopped.as_str(), "stopped");
            assert_eq!(TimerStatus::Running.as_str(), "running");
            assert_eq!(TimerStatus::Paused.as_str(), "paused");
        }

        #[test]
        fn test_serialize_deserialize() {
            let json = serde_json::to_string(&TimerStatus::Running).unwrap();
            assert_eq!(json, "\"running\"");

            let status: TimerStatus = serde_json::from_str("\"paused\"").unwrap();
            assert_eq!(status, TimerStatus::Paused);
        }
    }

    // ------------------------------------------------------------------------
    // TimerState Tests
    // ------------------------------------------------------------------------

    mod timer_state_tests {
        use super::*;

        #[test]
        fn test_new_state() {
            let state = TimerState::new(Schedule::default(), AlertThresholds::default());

            assert_eq!(state.status, TimerStatus::Stopped);
            assert_eq!(state.current_level_index, 0);
            assert_eq!(state.remaining_seconds, 1200);
            assert_eq!(state.run_started_at, None);
            assert_eq!(state.paused_offset_seconds, 0);
            assert_eq!(state.last_observed_remaining, None);
            assert!(!state.is_running());
        }

        #[test]
        fn test_current_and_next_level() {
            let mut state = TimerState::new(Schedule::default(), AlertThresholds::default());
            assert_eq!(state.current_level().big_blind, 200);
            assert_eq!(state.next_level().map(|l| l.big_blind), Some(300));

            state.current_level_index = 2;
            assert_eq!(state.current_level().big_blind, 400);
            assert!(state.next_level().is_none());
        }
    }

    // ------------------------------------------------------------------------
    // ClockSnapshot Tests
    // ------------------------------------------------------------------------

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_from_state() {
            let state = TimerState::new(Schedule::default(), AlertThresholds::default());
            let snapshot = ClockSnapshot::from_state(&state, &EventSettings::default());

            assert_eq!(snapshot.status, TimerStatus::Stopped);
            assert_eq!(snapshot.remaining_seconds, 1200);
            assert_eq!(snapshot.schedule.len(), 3);
            assert_eq!(snapshot.current_level().small_blind, 100);
            assert_eq!(snapshot.next_level().map(|l| l.big_blind), Some(300));
        }

        #[test]
        fn test_serialized_shape() {
            let state = TimerState::new(Schedule::default(), AlertThresholds::default());
            let snapshot = ClockSnapshot::from_state(&state, &EventSettings::default());
            let json = serde_json::to_value(&snapshot).unwrap();

            assert_eq!(json["status"], json!("stopped"));
            assert_eq!(json["currentLevelIndex"], json!(0));
            assert_eq!(json["remainingSeconds"], json!(1200));
            assert_eq!(json["alertThresholds"], json!([60, 10]));
            assert_eq!(json["schedule"][0]["durationSeconds"], json!(1200));
            assert_eq!(json["settings"]["tournamentName"], json!("Poker Tournament"));

            let back: ClockSnapshot = serde_json::from_value(json).unwrap();
            assert_eq!(back, snapshot);
        }
    }

    // ------------------------------------------------------------------------
    // IPC Type Tests
    // ------------------------------------------------------------------------

    mod ipc_tests {
        use super::*;

        #[test]
        fn test_simple_commands() {
            for (json, name) in [
                (r#"{"command":"start"}"#, "Start"),
                (r#"{"command":"pause"}"#, "Pause"),
                (r#"{"command":"resume"}"#, "Resume"),
                (r#"{"command":"reset"}"#, "Reset"),
                (r#"{"command":"next"}"#, "Next"),
                (r#"{"command":"prev"}"#, "Prev"),
                (r#"{"command":"status"}"#, "Status"),
                (r#"{"command":"subscribe"}"#, "Subscribe"),
            ] {
                let request: IpcRequest = serde_json::from_str(json).unwrap();
                assert_eq!(format!("{:?}", request), name);
            }
        }

        #[test]
        fn test_set_schedule_request() {
            let request: IpcRequest = serde_json::from_str(
                r#"{"command":"setSchedule","levels":[{"durationSeconds":120}]}"#,
            )
            .unwrap();

            match request {
                IpcRequest::SetSchedule { levels } => {
                    assert_eq!(levels, json!([{"durationSeconds": 120}]));
                }
                other => panic!("Expected SetSchedule, got {:?}", other),
            }
        }

        #[test]
        fn test_set_alerts_request() {
            let request = IpcRequest::SetAlerts {
                seconds: vec![json!(60), json!("10")],
            };
            let json = serde_json::to_string(&request).unwrap();
            assert_eq!(json, r#"{"command":"setAlerts","seconds":[60,"10"]}"#);
        }

        #[test]
        fn test_preset_request() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"preset","preset":"turbo"}"#).unwrap();
            assert!(matches!(
                request,
                IpcRequest::Preset {
                    preset: StructurePreset::Turbo
                }
            ));
        }

        #[test]
        fn test_sound_request_defaults() {
            let request: IpcRequest = serde_json::from_str(r#"{"command":"sound"}"#).unwrap();
            match request {
                IpcRequest::Sound {
                    kind,
                    sound_id,
                    volume,
                } => {
                    assert!(kind.is_none());
                    assert!(sound_id.is_none());
                    assert!(volume.is_none());
                }
                other => panic!("Expected Sound, got {:?}", other),
            }
        }

        #[test]
        fn test_unknown_command_fails() {
            let result: Result<IpcRequest, _> = serde_json::from_str(r#"{"command":"explode"}"#);
            assert!(result.is_err());
        }

        #[test]
        fn test_response_constructors() {
            let response = IpcResponse::success("ok", None);
            assert!(response.is_success());
            let json = serde_json::to_string(&response).unwrap();
            assert_eq!(json, r#"{"status":"success","message":"ok"}"#);

            let response = IpcResponse::error("boom");
            assert!(!response.is_success());
            assert_eq!(response.message, "boom");
            assert!(response.data.is_none());
        }
    }
}
