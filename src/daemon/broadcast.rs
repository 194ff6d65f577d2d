//! State broadcaster.
//!
//! Fans out snapshots, transition signals and sound cues to every connected
//! observer. Publishing never blocks the clock: slow subscribers lag and lose
//! the oldest notifications instead.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{ClockSnapshot, EventSettings};

use super::timer::ClockSignal;

/// Sound id used when the sound map has no entry for a cue kind
pub const FALLBACK_SOUND_ID: &str = "beep3";

/// Cue kind for level changes, also the default for ad-hoc cues
pub const LEVEL_CHANGE_CUE: &str = "levelChange";

// ============================================================================
// Notification
// ============================================================================

/// A sound observers should play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundCue {
    /// Cue kind (`alert60`, `levelChange`, `breakStart`, ...)
    pub kind: String,
    /// Sound to play
    pub sound_id: String,
    /// Playback volume in [0, 1]
    pub volume: f64,
}

impl SoundCue {
    /// Builds a cue, resolving the sound id through the settings' sound map.
    pub fn resolve(kind: &str, settings: &EventSettings) -> Self {
        Self {
            kind: kind.to_string(),
            sound_id: settings
                .sound_id(kind)
                .unwrap_or(FALLBACK_SOUND_ID)
                .to_string(),
            volume: settings.sound_volume,
        }
    }
}

/// Message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum Notification {
    /// Full clock snapshot
    State(ClockSnapshot),
    /// Transition side effect
    Signal(ClockSignal),
    /// Sound to play
    Sound(SoundCue),
}

// ============================================================================
// Sound Cue Dispatch
// ============================================================================

/// Maps a transition signal to the sound cue it triggers, if any.
///
/// `soundsEnabled` gates everything; each cue family has its own toggle.
pub fn sound_cue(signal: &ClockSignal, settings: &EventSettings) -> Option<SoundCue> {
    if !settings.sounds_enabled {
        return None;
    }

    let kind = match signal {
        ClockSignal::Alert { threshold, .. } if settings.enable_alerts => {
            format!("alert{}", threshold)
        }
        ClockSignal::LevelChanged { .. } if settings.enable_level_change_sound => {
            LEVEL_CHANGE_CUE.to_string()
        }
        ClockSignal::BreakEntered { .. } if settings.enable_break_sounds => {
            "breakStart".to_string()
        }
        ClockSignal::BreakExited { .. } if settings.enable_break_sounds => "breakEnd".to_string(),
        _ => return None,
    };

    Some(SoundCue::resolve(&kind, settings))
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Multi-subscriber notification channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<Notification>,
}

impl Broadcaster {
    /// Creates a broadcaster buffering up to `capacity` notifications per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes a notification. Having no subscribers is not an error.
    pub fn publish(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::trace!("No subscribers, notification dropped");
        }
    }

    /// Publishes signals with their sound cues, then the resulting snapshot.
    pub fn publish_transition(
        &self,
        signals: &[ClockSignal],
        settings: &EventSettings,
        snapshot: ClockSnapshot,
    ) {
        for signal in signals {
            tracing::debug!("Signal: {:?}", signal);
            self.publish(Notification::Signal(signal.clone()));
            if let Some(cue) = sound_cue(signal, settings) {
                self.publish(Notification::Sound(cue));
            }
        }
        self.publish(Notification::State(snapshot));
    }
}

// ============================================================================
// Tests
// ============================================================================
