//! Data-driven game balance
//!
//! Every knob the engines read lives here so a page can ship a JSON override
//! without rebuilding. Missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::progress::SectionKey;

/// Lights-Out grid settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitTuning {
    pub size: usize,
    pub unlock: Option<SectionKey>,
}

impl Default for CircuitTuning {
    fn default() -> Self {
        Self {
            size: 5,
            unlock: Some(SectionKey::Utility),
        }
    }
}

/// Signal routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTuning {
    pub size: usize,
    /// Generated layouts start powered, so routing unlocks nothing by default
    pub unlock: Option<SectionKey>,
}

impl Default for RoutingTuning {
    fn default() -> Self {
        Self { size: 6, unlock: None }
    }
}

/// Memory-match settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTuning {
    pub pairs: usize,
    /// Settle delay before a matching pair locks in
    pub match_delay_ms: u64,
    /// Settle delay before a mismatched pair flips back
    pub mismatch_delay_ms: u64,
    pub unlock: Option<SectionKey>,
}

impl Default for MemoryTuning {
    fn default() -> Self {
        Self {
            pairs: 10,
            match_delay_ms: 250,
            mismatch_delay_ms: 600,
            unlock: Some(SectionKey::Tokenomics),
        }
    }
}

/// System Collapse arcade settings (per-tick values assume 60 Hz)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeTuning {
    pub start_spawn_rate: f64,
    pub spawn_rate_step: f64,
    pub max_spawn_rate: f64,
    pub start_game_speed: f32,
    pub game_speed_step: f32,
    /// Per-tick roll for a power-up attempt
    pub powerup_roll: f64,
    /// Chance an attempt actually drops a power-up
    pub powerup_accept: f64,
    /// A boss spawns each time score crosses a multiple of this
    pub boss_score_interval: u64,
    pub wave_score_width: u64,
    /// Score that unlocks the arcade's section without beating a boss
    pub unlock_score: u64,
    pub player_step: f32,
    pub miss_damage: u32,
    pub boss_miss_damage: u32,
    pub boss_combo_bonus: u32,
    /// Ticks a boss ignores further hits after taking one
    pub boss_hit_cooldown_ticks: u32,
    pub shield_charges: u32,
    pub double_points_ticks: u32,
    pub heal_amount: u32,
    pub slow_amount: f32,
    pub min_game_speed: f32,
    pub unlock: Option<SectionKey>,
}

impl Default for ArcadeTuning {
    fn default() -> Self {
        Self {
            start_spawn_rate: 0.02,
            spawn_rate_step: 0.0001,
            max_spawn_rate: 0.08,
            start_game_speed: 1.0,
            game_speed_step: 0.001,
            powerup_roll: 0.005,
            powerup_accept: 0.15,
            boss_score_interval: 500,
            wave_score_width: 200,
            unlock_score: 300,
            player_step: 2.0,
            miss_damage: 10,
            boss_miss_damage: 30,
            boss_combo_bonus: 5,
            boss_hit_cooldown_ticks: 0,
            shield_charges: 3,
            double_points_ticks: 300,
            heal_amount: 30,
            slow_amount: 0.5,
            min_game_speed: 0.5,
            unlock: Some(SectionKey::Team),
        }
    }
}

/// Claimable key dropped into the terminal while `utility` is locked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityKeyTuning {
    pub enabled: bool,
    pub delay_ms: u64,
}

impl Default for UtilityKeyTuning {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 2200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub circuit: CircuitTuning,
    pub routing: RoutingTuning,
    pub memory: MemoryTuning,
    pub arcade: ArcadeTuning,
    pub utility_key: UtilityKeyTuning,
}

impl Tuning {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse, or log and use defaults
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(tuning) => tuning,
            Err(e) => {
                log::warn!("Invalid tuning ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let tuning = Tuning::from_json(r#"{"circuit":{"size":3},"arcade":{"unlock_score":50}}"#).unwrap();
        assert_eq!(tuning.circuit.size, 3);
        assert_eq!(tuning.circuit.unlock, Some(SectionKey::Utility));
        assert_eq!(tuning.arcade.unlock_score, 50);
        assert_eq!(tuning.arcade.boss_score_interval, 500);
        assert_eq!(tuning.memory, MemoryTuning::default());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let tuning = Tuning::from_json(r#"{"matrix_rain":{"font":16}}"#).unwrap();
        assert_eq!(tuning, Tuning::default());
    }

    #[test]
    fn test_invalid_json_falls_back() {
        assert_eq!(Tuning::from_json_or_default("not json"), Tuning::default());
    }

    #[test]
    fn test_null_unlock_disables() {
        let tuning = Tuning::from_json(r#"{"memory":{"unlock":null}}"#).unwrap();
        assert_eq!(tuning.memory.unlock, None);
    }
}
