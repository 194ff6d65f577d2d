//! Clock service.
//!
//! Owns the timer engine, event settings, tick scheduler and broadcaster of one
//! clock instance. Commands and ticks take the same lock, so every mutation is
//! applied and broadcast before the next one starts.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use crate::types::{
    AlertThresholds, ClockConfig, ClockSnapshot, EventSettings, StructurePreset,
};

use super::broadcast::{Broadcaster, Notification, SoundCue, LEVEL_CHANGE_CUE};
use super::scheduler::{Tickable, Ticker};
use super::timer::{ClockSignal, TimerEngine, Transition};

// ============================================================================
// Outcome
// ============================================================================

/// Result of a command applied to the service.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Whether the command changed anything
    pub applied: bool,
    /// Signals emitted, in order
    pub signals: Vec<ClockSignal>,
    /// Snapshot after the command
    pub snapshot: ClockSnapshot,
}

// ============================================================================
// ClockService
// ============================================================================

/// Mutable part of the service, guarded by one lock.
struct Inner {
    engine: TimerEngine,
    settings: EventSettings,
    /// Present exactly while the clock is running
    ticker: Option<Ticker>,
}

/// One clock instance: engine, settings, scheduler and broadcaster.
pub struct ClockService {
    /// Handle given to tickers so they never keep the service alive
    this: Weak<ClockService>,
    inner: Mutex<Inner>,
    broadcaster: Broadcaster,
    tick_period: Duration,
}

impl ClockService {
    /// Creates a service from daemon configuration.
    pub fn new(config: &ClockConfig) -> Arc<Self> {
        Self::with_parts(
            TimerEngine::from_config(config),
            EventSettings::default(),
            Broadcaster::new(config.broadcast_capacity),
            config.tick_period(),
        )
    }

    /// Creates a service from its parts.
    pub fn with_parts(
        engine: TimerEngine,
        settings: EventSettings,
        broadcaster: Broadcaster,
        tick_period: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            inner: Mutex::new(Inner {
                engine,
                settings,
                ticker: None,
            }),
            broadcaster,
            tick_period,
        })
    }

    /// Returns the broadcaster.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> ClockSnapshot {
        let inner = self.inner.lock().await;
        ClockSnapshot::from_state(inner.engine.state(), &inner.settings)
    }

    /// Registers an observer.
    ///
    /// The snapshot and the receiver are taken under the lock, so the
    /// observer sees every notification published after that snapshot.
    pub async fn subscribe(&self) -> (ClockSnapshot, broadcast::Receiver<Notification>) {
        let inner = self.inner.lock().await;
        let receiver = self.broadcaster.subscribe();
        let snapshot = ClockSnapshot::from_state(inner.engine.state(), &inner.settings);
        (snapshot, receiver)
    }

    /// Returns true while a tick loop is alive.
    pub async fn has_ticker(&self) -> bool {
        self.inner.lock().await.ticker.is_some()
    }

    // ------------------------------------------------------------------------
    // Timer commands
    // ------------------------------------------------------------------------

    /// Starts the current level with a fresh countdown.
    pub async fn start(&self) -> Outcome {
        self.apply("start", |engine, now| engine.start(now)).await
    }

    /// Pauses the running clock.
    pub async fn pause(&self) -> Outcome {
        self.apply("pause", |engine, now| engine.pause(now)).await
    }

    /// Resumes a paused clock.
    pub async fn resume(&self) -> Outcome {
        self.apply("resume", |engine, now| engine.resume(now)).await
    }

    /// Returns to the first level, stopped.
    pub async fn reset(&self) -> Outcome {
        self.apply("reset", |engine, _| engine.reset()).await
    }

    /// Advances to the next level.
    pub async fn next_level(&self) -> Outcome {
        self.apply("next", |engine, now| engine.next_level(now)).await
    }

    /// Goes back to the previous level.
    pub async fn prev_level(&self) -> Outcome {
        self.apply("prev", |engine, now| engine.prev_level(now)).await
    }

    /// Replaces the schedule with raw levels and resets.
    pub async fn set_schedule(&self, levels: &Value) -> Outcome {
        self.apply("setSchedule", |engine, _| engine.set_schedule(levels))
            .await
    }

    /// Replaces the alert thresholds; invalid entries are dropped.
    pub async fn set_alert_thresholds(&self, seconds: &[Value]) -> Outcome {
        let thresholds = AlertThresholds::from_raw(seconds);
        self.apply("setAlerts", |engine, _| {
            engine.set_alert_thresholds(thresholds)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Settings commands
    // ------------------------------------------------------------------------

    /// Merges a settings patch. Timer state is untouched.
    pub async fn update_settings(&self, patch: &Map<String, Value>) -> Outcome {
        let mut inner = self.inner.lock().await;
        inner.settings.apply_patch(patch);
        tracing::info!("Settings updated ({} keys)", patch.len());
        self.commit(&mut inner, Transition::applied())
    }

    /// Merges settings, installs `levels`/`alertSeconds` when present and resets.
    pub async fn init(&self, patch: &Map<String, Value>) -> Outcome {
        let mut inner = self.inner.lock().await;
        inner.settings.apply_patch(patch);

        if let Some(Value::Array(seconds)) = patch.get("alertSeconds") {
            inner
                .engine
                .set_alert_thresholds(AlertThresholds::from_raw(seconds));
        }
        let transition = match patch.get("levels") {
            Some(levels @ Value::Array(_)) => inner.engine.set_schedule(levels),
            _ => inner.engine.reset(),
        };

        tracing::info!(
            "Clock initialised ({} levels)",
            inner.engine.state().schedule.len()
        );
        self.commit(&mut inner, transition)
    }

    /// Applies a built-in structure and resets.
    pub async fn apply_preset(&self, preset: StructurePreset) -> Outcome {
        let structure = preset.structure();
        let mut inner = self.inner.lock().await;

        inner.settings.starting_stack = structure.starting_stack;
        inner.settings.structure_preset = preset.as_str().to_string();
        inner
            .engine
            .set_alert_thresholds(structure.alert_thresholds);
        let transition = inner.engine.install_schedule(structure.schedule);

        tracing::info!("Preset applied: {}", structure.label);
        self.commit(&mut inner, transition)
    }

    /// Relays an ad-hoc sound cue to observers without touching state.
    ///
    /// Without `sound_id`, the id comes from the sound map entry for `kind`.
    pub async fn play_sound(
        &self,
        kind: Option<&str>,
        sound_id: Option<&str>,
        volume: Option<f64>,
    ) -> SoundCue {
        let inner = self.inner.lock().await;
        let mut cue = SoundCue::resolve(kind.unwrap_or(LEVEL_CHANGE_CUE), &inner.settings);
        if let Some(sound_id) = sound_id {
            cue.sound_id = sound_id.to_string();
        }
        if let Some(volume) = volume.filter(|v| v.is_finite()) {
            cue.volume = volume.clamp(0.0, 1.0);
        }

        tracing::info!("Sound cue relayed: {} ({})", cue.kind, cue.sound_id);
        self.broadcaster.publish(Notification::Sound(cue.clone()));
        cue
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Runs an engine command under the lock and commits its result.
    async fn apply<F>(&self, name: &str, command: F) -> Outcome
    where
        F: FnOnce(&mut TimerEngine, Instant) -> Transition,
    {
        let mut inner = self.inner.lock().await;
        let transition = command(&mut inner.engine, Instant::now());

        if transition.applied {
            tracing::info!(
                "Command {} applied (status: {}, level: {})",
                name,
                inner.engine.state().status.as_str(),
                inner.engine.state().current_level_index + 1
            );
        } else {
            tracing::debug!("Command {} ignored", name);
        }

        self.commit(&mut inner, transition)
    }

    /// Reconciles the ticker with the engine and broadcasts an applied transition.
    fn commit(&self, inner: &mut Inner, transition: Transition) -> Outcome {
        self.sync_ticker(inner);

        let snapshot = ClockSnapshot::from_state(inner.engine.state(), &inner.settings);
        if transition.applied {
            self.broadcaster
                .publish_transition(&transition.signals, &inner.settings, snapshot.clone());
        }
        if transition.completed_event() {
            tracing::info!("Event complete");
        }

        Outcome {
            applied: transition.applied,
            signals: transition.signals,
            snapshot,
        }
    }

    /// Keeps exactly one ticker, anchored to the current run segment, while running.
    fn sync_ticker(&self, inner: &mut Inner) {
        let state = inner.engine.state();
        match (state.is_running(), state.run_started_at) {
            (true, Some(anchor)) => {
                if inner.ticker.as_ref().map(Ticker::anchor) != Some(anchor) {
                    inner.ticker = Some(Ticker::spawn(self.this.clone(), anchor, self.tick_period));
                }
            }
            _ => {
                if inner.ticker.take().is_some() {
                    tracing::debug!("Ticker stopped");
                }
            }
        }
    }
}

impl Tickable for ClockService {
    async fn on_tick(&self, anchor: Instant, _now: Instant) {
        let mut inner = self.inner.lock().await;

        // A tick queued behind a command that replaced the ticker
        if inner.ticker.as_ref().map(Ticker::anchor) != Some(anchor) {
            return;
        }

        let transition = inner.engine.tick(Instant::now());
        tracing::debug!(
            "Tick (level: {}, remaining: {}s)",
            inner.engine.state().current_level_index + 1,
            inner.engine.state().remaining_seconds
        );
        for signal in &transition.signals {
            if let ClockSignal::LevelChanged { to, .. } = signal {
                tracing::info!("Level {} started", to + 1);
            }
        }

        self.commit(&mut inner, transition);
    }
}

// ============================================================================
// Tests
// ============================================================================
