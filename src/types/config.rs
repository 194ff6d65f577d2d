//! Daemon configuration.
//!
//! Configuration comes from an optional JSON file. Every field has a default,
//! so an empty object (or no file at all) yields a working daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::alerts::{AlertThresholds, DEFAULT_ALERT_SECONDS};
use super::level::{LevelNormalizer, Schedule, FALLBACK_LEVEL_SECONDS, MIN_LEVEL_SECONDS};

/// Default socket path, relative to the home directory
pub const DEFAULT_SOCKET_PATH: &str = ".blindclock/blindclock.sock";

fn default_tick_millis() -> u64 {
    1000
}

fn default_min_level_seconds() -> u32 {
    MIN_LEVEL_SECONDS
}

fn default_fallback_level_seconds() -> u32 {
    FALLBACK_LEVEL_SECONDS
}

fn default_alert_seconds() -> Vec<u32> {
    DEFAULT_ALERT_SECONDS.to_vec()
}

fn default_broadcast_capacity() -> usize {
    256
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No socket path was configured and the home directory is unknown
    #[error("Cannot determine the home directory for the default socket path")]
    NoHomeDir,
}

/// Clock daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Unix socket path; defaults to `~/.blindclock/blindclock.sock`
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Scheduler period in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Shortest allowed level duration in seconds
    #[serde(default = "default_min_level_seconds")]
    pub min_level_seconds: u32,

    /// Duration given to levels without a usable duration
    #[serde(default = "default_fallback_level_seconds")]
    pub fallback_level_seconds: u32,

    /// Initial alert thresholds in seconds remaining
    #[serde(default = "default_alert_seconds")]
    pub alert_seconds: Vec<u32>,

    /// Buffered notifications per observer before it starts lagging
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Initial raw schedule; the built-in three-level structure when absent
    #[serde(default)]
    pub schedule: Option<Value>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            tick_millis: default_tick_millis(),
            min_level_seconds: default_min_level_seconds(),
            fallback_level_seconds: default_fallback_level_seconds(),
            alert_seconds: default_alert_seconds(),
            broadcast_capacity: default_broadcast_capacity(),
            schedule: None,
        }
    }
}

impl ClockConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_millis == 0 {
            return Err(ConfigError::Invalid("tick_millis must be positive".to_string()));
        }
        if self.min_level_seconds == 0 {
            return Err(ConfigError::Invalid(
                "min_level_seconds must be positive".to_string(),
            ));
        }
        if self.fallback_level_seconds < self.min_level_seconds {
            return Err(ConfigError::Invalid(format!(
                "fallback_level_seconds ({}) is below min_level_seconds ({})",
                self.fallback_level_seconds, self.min_level_seconds
            )));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured socket path or the default one.
    pub fn resolve_socket_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.socket_path {
            Some(path) => Ok(path.clone()),
            None => default_socket_path(),
        }
    }

    /// Returns the scheduler period.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    /// Returns the level normalizer for this configuration.
    pub fn normalizer(&self) -> LevelNormalizer {
        LevelNormalizer::new(self.min_level_seconds, self.fallback_level_seconds)
    }

    /// Returns the schedule the clock boots with.
    pub fn initial_schedule(&self) -> Schedule {
        let normalizer = self.normalizer();
        match &self.schedule {
            Some(raw) => normalizer.normalize_schedule(raw),
            None => normalizer.clamp_schedule(Schedule::default()),
        }
    }

    /// Returns the alert thresholds the clock boots with.
    pub fn initial_alert_thresholds(&self) -> AlertThresholds {
        AlertThresholds::from_seconds(self.alert_seconds.iter().copied())
    }
}

/// Returns `~/.blindclock/blindclock.sock`.
pub fn default_socket_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_SOCKET_PATH))
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ClockConfig::default();
        assert_eq!(config.tick_millis, 1000);
        assert_eq!(config.min_level_seconds, 60);
        assert_eq!(config.alert_seconds, vec![60, 10]);
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        let config: ClockConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClockConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.json");
        std::fs::write(
            &path,
            r#"{"tick_millis": 500, "alert_seconds": [30], "schedule": [{"durationSeconds": 90}]}"#,
        )
        .unwrap();

        let config = ClockConfig::load(&path).unwrap();
        assert_eq!(config.tick_millis, 500);
        assert_eq!(config.initial_alert_thresholds().as_slice(), &[30]);
        assert_eq!(config.initial_schedule().first().duration_seconds, 90);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ClockConfig::load(Path::new("/nonexistent/blindclock.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = ClockConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = ClockConfig::load_or_default(None).unwrap();
        assert_eq!(config, ClockConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClockConfig {
            tick_millis: 0,
            ..ClockConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClockConfig {
            min_level_seconds: 0,
            ..ClockConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClockConfig {
            min_level_seconds: 120,
            fallback_level_seconds: 60,
            ..ClockConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClockConfig {
            broadcast_capacity: 0,
            ..ClockConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_path_override() {
        let config = ClockConfig {
            socket_path: Some(PathBuf::from("/tmp/clock.sock")),
            ..ClockConfig::default()
        };
        assert_eq!(
            config.resolve_socket_path().unwrap(),
            PathBuf::from("/tmp/clock.sock")
        );
    }

    #[test]
    fn test_initial_schedule_respects_floor() {
        let config = ClockConfig {
            min_level_seconds: 1500,
            fallback_level_seconds: 1500,
            ..ClockConfig::default()
        };
        let schedule = config.initial_schedule();
        assert!(schedule.levels().iter().all(|l| l.duration_seconds == 1500));

        let config = ClockConfig {
            schedule: Some(json!([])),
            ..ClockConfig::default()
        };
        assert_eq!(config.initial_schedule().len(), 1);
    }
}
