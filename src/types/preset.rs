//! Built-in tournament structures.

use serde::{Deserialize, Serialize};

use super::alerts::AlertThresholds;
use super::level::{Level, Schedule};

/// Named blind structure that can be applied in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StructurePreset {
    /// 10-minute levels, 20k stack
    Turbo,
    /// 15-minute levels, 30k stack
    Standard,
    /// 20-minute levels, 50k stack
    Deepstack,
}

/// Everything a preset installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetStructure {
    pub label: &'static str,
    pub starting_stack: u64,
    pub alert_thresholds: AlertThresholds,
    pub schedule: Schedule,
}

impl StructurePreset {
    /// Returns the identifier stored in settings.
    pub fn as_str(&self) -> &'static str {
        match self {
            StructurePreset::Turbo => "turbo",
            StructurePreset::Standard => "standard",
            StructurePreset::Deepstack => "deepstack",
        }
    }

    /// Builds the structure for this preset.
    pub fn structure(&self) -> PresetStructure {
        let (label, minutes, starting_stack, alerts, levels): (_, u32, _, Vec<u32>, _) = match self {
            StructurePreset::Turbo => (
                "Turbo 10 min / 20k",
                10,
                20000,
                vec![60, 10],
                [(100, 200, 0), (200, 400, 0), (300, 600, 50), (400, 800, 100)],
            ),
            StructurePreset::Standard => (
                "Standard 15 min / 30k",
                15,
                30000,
                vec![60, 10],
                [(100, 200, 0), (200, 400, 0), (300, 600, 100), (400, 800, 100)],
            ),
            StructurePreset::Deepstack => (
                "Deepstack 20 min / 50k",
                20,
                50000,
                vec![120, 60, 10],
                [(100, 100, 0), (100, 200, 0), (200, 300, 0), (200, 400, 50)],
            ),
        };

        let mut schedule: Vec<Level> = levels
            .iter()
            .map(|&(sb, bb, ante)| Level::play(minutes * 60, sb, bb, ante))
            .collect();
        // Five-minute break before the final level
        schedule.insert(schedule.len() - 1, Level::break_level(5 * 60));

        PresetStructure {
            label,
            starting_stack,
            alert_thresholds: AlertThresholds::from_seconds(alerts),
            schedule: Schedule::try_from(schedule).unwrap_or_default(),
        }
    }
}
