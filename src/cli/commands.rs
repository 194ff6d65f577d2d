//! Command definitions for the blind clock CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::StructurePreset;

// ============================================================================
// CLI Structure
// ============================================================================

/// Blind clock - poker tournament level timer
#[derive(Parser, Debug)]
#[command(
    name = "blindclock",
    version,
    about = "Poker tournament blind clock",
    long_about = "Authoritative tournament clock. Run `blindclock daemon` once, then drive \n\
                  it from any terminal: start/pause levels, step through the structure, \n\
                  push schedules and settings, or watch the live state.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Unix socket path (defaults to ~/.blindclock/blindclock.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// JSON configuration file for the daemon
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the clock daemon in the foreground
    Daemon,

    /// Start the current level from its full duration
    Start,

    /// Pause the running clock
    Pause,

    /// Resume a paused clock
    Resume,

    /// Stop and return to level 1
    Reset,

    /// Advance to the next level
    Next,

    /// Go back to the previous level
    Prev,

    /// Show the clock status and level table
    Status,

    /// Replace the blind schedule from a JSON file (array of levels)
    Schedule {
        /// JSON file with the level list
        file: PathBuf,
    },

    /// Set alert thresholds in seconds remaining (e.g. "120,60,10")
    Alerts {
        /// Comma-separated seconds
        #[arg(value_delimiter = ',', num_args = 1.., required = true)]
        seconds: Vec<String>,
    },

    /// Merge event settings from a JSON file
    Settings {
        /// JSON file with the settings object
        file: PathBuf,
    },

    /// Initialise settings, levels and alerts from a JSON file, then reset
    Init {
        /// JSON file with settings plus optional `levels` and `alertSeconds`
        file: PathBuf,
    },

    /// Apply a built-in tournament structure
    Preset {
        /// Structure to apply
        #[arg(value_enum)]
        preset: StructurePreset,
    },

    /// Send a sound cue to every observer
    Sound(SoundArgs),

    /// Print live notifications until interrupted
    Watch {
        /// Print raw JSON lines instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Sound Command Arguments
// ============================================================================

/// Arguments for the sound command
#[derive(Args, Debug, Clone, Default)]
pub struct SoundArgs {
    /// Cue kind (alert60, levelChange, breakStart, ...)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Sound id overriding the configured sound map
    #[arg(short, long)]
    pub sound_id: Option<String>,

    /// Playback volume (0.0-1.0)
    #[arg(long, value_parser = parse_volume)]
    pub volume: Option<f64>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Parses a volume in [0, 1].
fn parse_volume(s: &str) -> Result<f64, String> {
    let volume: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !(0.0..=1.0).contains(&volume) {
        return Err("volume must be between 0.0 and 1.0".to_string());
    }
    Ok(volume)
}

// ============================================================================
// Tests
// ============================================================================
