//! Difficulty tiers, season pacing, and persisted user settings.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::systems::director::Season;

// ============================================================================
// DIFFICULTY TIERS
// ============================================================================

/// Global difficulty selection. Each tier is a set of flat multipliers
/// applied on top of season pacing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum DifficultyTier {
    Relaxed,
    #[default]
    Standard,
    Brutal,
}

/// Resolved multipliers for a tier.
#[derive(Clone, Copy, Debug)]
pub struct TierMults {
    /// Enemy machine health.
    pub enemy_health: f32,
    /// Wave budget (machine count).
    pub machine_count: f32,
    /// Seconds between automaton steps.
    pub step_interval: f32,
    /// Pause between step cycles.
    pub step_pause: f32,
}

impl DifficultyTier {
    pub fn mults(self) -> TierMults {
        match self {
            DifficultyTier::Relaxed => TierMults {
                enemy_health: 0.75,
                machine_count: 0.75,
                step_interval: 1.25,
                step_pause: 1.25,
            },
            DifficultyTier::Standard => TierMults {
                enemy_health: 1.0,
                machine_count: 1.0,
                step_interval: 1.0,
                step_pause: 1.0,
            },
            DifficultyTier::Brutal => TierMults {
                enemy_health: 1.5,
                machine_count: 1.25,
                step_interval: 0.85,
                step_pause: 0.6,
            },
        }
    }
}

// ============================================================================
// SEASON PACING
// ============================================================================

/// Per-season pacing knobs, multiplied with the tier multipliers.
#[derive(Clone, Copy, Debug)]
pub struct SeasonPacing {
    /// Cycle pause multiplier.
    pub pause: f32,
    /// Wave budget multiplier.
    pub count: f32,
    /// Step interval multiplier.
    pub step: f32,
}

pub fn season_pacing(season: Season) -> SeasonPacing {
    match season {
        Season::Summer => SeasonPacing { pause: 1.0, count: 1.0, step: 1.0 },
        Season::Autumn => SeasonPacing { pause: 0.9, count: 1.1, step: 1.1 },
        Season::Winter => SeasonPacing { pause: 1.1, count: 1.2, step: 1.25 },
        Season::Void => SeasonPacing { pause: 0.8, count: 1.3, step: 0.9 },
    }
}

// ============================================================================
// PERSISTED SETTINGS
// ============================================================================

/// Persisted user settings. Saved to `Documents/Cellstorm/settings.json`.
#[derive(Resource, Serialize, Deserialize, Clone)]
pub struct UserSettings {
    #[serde(default)]
    pub difficulty: DifficultyTier,
    #[serde(default = "default_true")]
    pub show_minimap: bool,
    #[serde(default = "default_true")]
    pub screen_shake: bool,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

fn default_true() -> bool {
    true
}
fn default_move_speed() -> f32 {
    120.0
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            difficulty: DifficultyTier::Standard,
            show_minimap: true,
            screen_shake: true,
            move_speed: 120.0,
        }
    }
}

fn settings_path() -> Option<PathBuf> {
    let home = std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .ok()?;
    let dir = PathBuf::from(home).join("Documents").join("Cellstorm");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("settings.json"))
}

pub fn save_settings(settings: &UserSettings) {
    let Some(path) = settings_path() else { return };
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                warn!("Failed to save settings: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize settings: {}", e),
    }
}

pub fn load_settings() -> UserSettings {
    let Some(path) = settings_path() else { return UserSettings::default() };
    match std::fs::read_to_string(&path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
        Err(_) => UserSettings::default(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tier_is_identity() {
        let m = DifficultyTier::Standard.mults();
        assert_eq!(m.enemy_health, 1.0);
        assert_eq!(m.machine_count, 1.0);
        assert_eq!(m.step_interval, 1.0);
        assert_eq!(m.step_pause, 1.0);
    }

    #[test]
    fn settings_survive_unknown_and_missing_fields() {
        let parsed: UserSettings = serde_json::from_str(r#"{"difficulty":"Brutal"}"#)
            .unwrap_or_default();
        assert_eq!(parsed.difficulty, DifficultyTier::Brutal);
        assert!(parsed.show_minimap);
        assert_eq!(parsed.move_speed, 120.0);
    }
}
