//! Event settings carried alongside the clock.
//!
//! The clock does not interpret these values; it stores them, merges updates
//! from the admin surface and rebroadcasts them in every snapshot so displays
//! can render names, player counts, themes and sound preferences. The only
//! reader inside the crate is the sound cue dispatcher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce;

/// Maximum overlay dim percentage accepted from clients
pub const MAX_OVERLAY_DIM: u64 = 70;

/// Keys that belong to the clock itself and never land in settings
const RESERVED_KEYS: &[&str] = &[
    "levels",
    "schedule",
    "alertSeconds",
    "alertThresholds",
    "status",
    "currentLevelIndex",
    "remainingSeconds",
    "pausedOffsetSeconds",
];

fn default_tournament_name() -> String {
    "Poker Tournament".to_string()
}

fn default_sound_map() -> BTreeMap<String, String> {
    [
        ("alert60", "beep3"),
        ("alert10", "triangle"),
        ("levelChange", "levelup"),
        ("breakStart", "gong"),
        ("breakEnd", "bell"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Display, player and sound settings rebroadcast with the clock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    pub tournament_name: String,
    pub subtitle: String,
    pub structure_preset: String,
    pub players_total: u64,
    pub players_left: u64,
    pub reentries_count: u64,
    pub addons_count: u64,
    pub starting_stack: u64,
    pub addon_stack: u64,
    /// Last level (1-based) at which late registration is still open; 0 disables it
    pub late_reg_end_level: u64,
    pub payout_preset: String,
    pub show_payouts: bool,
    pub show_chips_in_play: bool,
    pub show_avg_stack: bool,
    /// Master switch for every sound cue
    pub sounds_enabled: bool,
    pub enable_alerts: bool,
    pub enable_level_change_sound: bool,
    pub enable_break_sounds: bool,
    /// Playback volume in `[0, 1]`
    pub sound_volume: f64,
    /// Cue kind (`alert60`, `levelChange`, ...) to sound id
    pub sound_map: BTreeMap<String, String>,
    pub background_preset: String,
    pub background_custom: String,
    /// Background overlay dim percentage in `[0, 70]`
    pub overlay_dim: u64,
    pub theme: String,
    pub logo_path: String,
    /// Keys this version does not know about, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            tournament_name: default_tournament_name(),
            subtitle: "Main Event".to_string(),
            structure_preset: "default".to_string(),
            players_total: 100,
            players_left: 100,
            reentries_count: 0,
            addons_count: 0,
            starting_stack: 20000,
            addon_stack: 10000,
            late_reg_end_level: 0,
            payout_preset: "auto".to_string(),
            show_payouts: false,
            show_chips_in_play: true,
            show_avg_stack: true,
            sounds_enabled: true,
            enable_alerts: true,
            enable_level_change_sound: true,
            enable_break_sounds: true,
            sound_volume: 0.5,
            sound_map: default_sound_map(),
            background_preset: "nebula".to_string(),
            background_custom: String::new(),
            overlay_dim: 35,
            theme: "bulletBlue".to_string(),
            logo_path: String::new(),
            extra: Map::new(),
        }
    }
}

impl EventSettings {
    /// Merges a partial update.
    ///
    /// Known keys are only replaced by values of the same JSON type (numbers
    /// are floored for integer fields), `soundMap` merges entry by entry, and
    /// unknown keys are stored as-is. Malformed values are ignored.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) {
        let Ok(Value::Object(mut current)) = serde_json::to_value(&*self) else {
            return;
        };

        for (key, incoming) in patch {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if self.extra.contains_key(key) {
                current.insert(key.clone(), incoming.clone());
                continue;
            }

            match current.get_mut(key) {
                Some(Value::Object(existing)) if key == "soundMap" => {
                    if let Value::Object(entries) = incoming {
                        for (cue, sound) in entries {
                            if sound.is_string() {
                                existing.insert(cue.clone(), sound.clone());
                            }
                        }
                    }
                }
                Some(existing) => {
                    if let Some(value) = coerce_like(existing, incoming) {
                        *existing = value;
                    }
                }
                None => {
                    current.insert(key.clone(), incoming.clone());
                }
            }
        }

        match serde_json::from_value::<EventSettings>(Value::Object(current)) {
            Ok(mut updated) => {
                updated.clamp();
                *self = updated;
            }
            Err(e) => tracing::warn!("Ignoring settings patch: {}", e),
        }
    }

    /// Applies the range rules for counts, volume and overlay.
    pub fn clamp(&mut self) {
        if self.tournament_name.trim().is_empty() {
            self.tournament_name = default_tournament_name();
        } else {
            self.tournament_name = self.tournament_name.trim().to_string();
        }
        self.subtitle = self.subtitle.trim().to_string();
        self.players_left = self.players_left.min(self.players_total);
        self.overlay_dim = self.overlay_dim.min(MAX_OVERLAY_DIM);
        self.sound_volume = if self.sound_volume.is_finite() {
            self.sound_volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Returns the sound id configured for a cue kind.
    pub fn sound_id(&self, kind: &str) -> Option<&str> {
        self.sound_map.get(kind).map(String::as_str)
    }
}

/// Converts `incoming` to the JSON type of `existing`, if compatible.
fn coerce_like(existing: &Value, incoming: &Value) -> Option<Value> {
    match existing {
        Value::Number(n) if n.is_u64() => {
            let v = coerce::number(Some(incoming)).filter(|_| incoming.is_number())?;
            Some(Value::from(coerce::floor_u64(v)))
        }
        Value::Number(_) => {
            let v = coerce::number(Some(incoming)).filter(|_| incoming.is_number())?;
            serde_json::Number::from_f64(v).map(Value::Number)
        }
        Value::Bool(_) => incoming.as_bool().map(Value::Bool),
        Value::String(_) => incoming.as_str().map(|s| Value::String(s.to_string())),
        _ => Some(incoming.clone()),
    }
}
