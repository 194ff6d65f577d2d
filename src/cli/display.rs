//! Display utilities for the blind clock CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Error messages
//! - Status display with the level table
//! - Live notifications for `watch`

use crate::daemon::{ClockSignal, Navigation, Notification};
use crate::types::{ClockSnapshot, IpcResponse, Level, TimerStatus};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a command.
    pub fn show_response(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
        if let Some(snapshot) = &response.data {
            println!("  {}", Self::clock_line(snapshot));
        }
    }

    /// Shows the current clock status.
    pub fn show_status(response: &IpcResponse) {
        match &response.data {
            Some(snapshot) => print!("{}", Self::status_report(snapshot)),
            None => println!("The clock is not available"),
        }
    }

    /// Shows one live notification.
    pub fn show_notification(notification: &Notification) {
        println!("{}", Self::notification_line(notification));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Builds the full status report.
    pub fn status_report(snapshot: &ClockSnapshot) -> String {
        let settings = &snapshot.settings;
        let mut out = String::new();

        out.push_str(&settings.tournament_name);
        if !settings.subtitle.is_empty() {
            out.push_str(&format!(" - {}", settings.subtitle));
        }
        out.push('\n');
        out.push_str("─────────────────────────────\n");
        out.push_str(&format!("Status: {}\n", Self::status_label(snapshot.status)));
        out.push_str(&format!("{}\n", Self::clock_line(snapshot)));

        match snapshot.next_level() {
            Some(next) => out.push_str(&format!("Next: {}\n", Self::level_label(next))),
            None => out.push_str("Next: final level\n"),
        }
        if !snapshot.alert_thresholds.is_empty() {
            let alerts: Vec<String> = snapshot
                .alert_thresholds
                .as_slice()
                .iter()
                .map(|s| format!("{}s", s))
                .collect();
            out.push_str(&format!("Alerts: {}\n", alerts.join(", ")));
        }

        out.push('\n');
        for (index, level) in snapshot.schedule.levels().iter().enumerate() {
            let marker = if index == snapshot.current_level_index {
                '>'
            } else {
                ' '
            };
            out.push_str(&format!(
                "{} {:>2}. {:<28} {}\n",
                marker,
                index + 1,
                Self::level_label(level),
                Self::format_clock(level.duration_seconds)
            ));
        }

        out
    }

    /// Builds the one-line clock summary.
    pub fn clock_line(snapshot: &ClockSnapshot) -> String {
        format!(
            "Level {}/{}: {}  [{}]",
            snapshot.current_level_index + 1,
            snapshot.schedule.len(),
            Self::level_label(snapshot.current_level()),
            Self::format_clock(snapshot.remaining_seconds)
        )
    }

    /// Describes a level's blinds, or marks it as a break.
    pub fn level_label(level: &Level) -> String {
        if level.is_break {
            return "Break".to_string();
        }
        if level.ante > 0 {
            format!(
                "{}/{} ante {}",
                level.small_blind, level.big_blind, level.ante
            )
        } else {
            format!("{}/{}", level.small_blind, level.big_blind)
        }
    }

    /// Builds the line printed for a live notification.
    pub fn notification_line(notification: &Notification) -> String {
        match notification {
            Notification::State(snapshot) => format!(
                "[{}] {}",
                snapshot.status.as_str(),
                Self::clock_line(snapshot)
            ),
            Notification::Signal(signal) => match signal {
                ClockSignal::LevelChanged {
                    from,
                    to,
                    navigation,
                } => {
                    let by = match navigation {
                        Navigation::Auto => "time",
                        Navigation::Manual => "operator",
                    };
                    format!("Level {} -> {} ({})", from + 1, to + 1, by)
                }
                ClockSignal::BreakEntered { level_index } => {
                    format!("Break started (level {})", level_index + 1)
                }
                ClockSignal::BreakExited { level_index } => {
                    format!("Break over (level {})", level_index + 1)
                }
                ClockSignal::Alert {
                    threshold,
                    level_index,
                } => format!(
                    "Alert: {} left in level {}",
                    Self::format_clock(*threshold),
                    level_index + 1
                ),
                ClockSignal::EventComplete { level_index } => {
                    format!("Event complete (level {})", level_index + 1)
                }
            },
            Notification::Sound(cue) => format!(
                "Sound: {} -> {} (volume {:.2})",
                cue.kind, cue.sound_id, cue.volume
            ),
        }
    }

    /// Returns the label for a status.
    fn status_label(status: TimerStatus) -> &'static str {
        match status {
            TimerStatus::Stopped => "Stopped",
            TimerStatus::Running => "Running",
            TimerStatus::Paused => "Paused",
        }
    }

    /// Formats seconds as `MM:SS`; minutes are not wrapped into hours.
    pub fn format_clock(total_seconds: u32) -> String {
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

// ============================================================================
// Tests
// ============================================================================
