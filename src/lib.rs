//! Blind Clock Library
//!
//! This library provides the core functionality for the poker tournament
//! blind clock. It includes:
//! - Level normalization, alert thresholds, settings and presets
//! - Timer engine with drift-free countdown and auto-advance
//! - Tick scheduler, notification broadcaster and clock service
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities

pub mod cli;
pub mod daemon;
pub mod types;

// Re-export commonly used types for convenience
pub use daemon::{ClockService, ClockSignal, Notification, SoundCue, TimerEngine, Transition};
pub use types::{
    AlertThresholds, ClockConfig, ClockSnapshot, EventSettings, IpcRequest, IpcResponse, Level,
    LevelNormalizer, Schedule, StructurePreset, TimerState, TimerStatus,
};
