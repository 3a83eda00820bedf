//! Bot configuration.
//!
//! Loads settings from config.json next to the executable. Every field has a
//! default, so a missing or partially filled file still yields a working
//! configuration. Pest definitions can be overridden wholesale via `pests`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::catalog::PestDefinition;
use crate::collaborators::{Point, Rect, Zone};

/// Complete bot configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Default watering amount in liters when no amount was recognized.
    pub watering_amount: f32,
    /// Liters per plant when watering with fertilizer.
    pub fertilizer_amount: f32,
    /// Acceptable water range (min, max) liters, informational.
    pub water_range: (f32, f32),
    /// Target soil level percentage, informational.
    pub soil_percentage: u8,

    /// Seconds between analysis cycles.
    pub poll_interval_secs: f32,
    /// Minimum seconds between saved screenshot artifacts.
    pub screenshot_interval_secs: f32,
    /// Seconds between periodic statistics log blocks.
    pub stats_interval_secs: f32,

    /// Per-pest treatment cooldown in seconds.
    pub pest_cooldown_secs: f32,
    /// Watering cooldown in seconds.
    pub water_cooldown_secs: f32,
    /// Fertilizer is suppressed for this many seconds after a treatment.
    pub fertilizer_suppress_secs: f32,
    /// Check the watering can after every Nth successful watering.
    pub water_check_every: u32,
    /// Minimum belief confidence before any action is taken.
    pub confidence_threshold: f32,

    /// Game process executable name.
    pub process_name: String,
    /// Re-focus the game window before injecting input.
    pub focus_game_window: bool,
    /// Which zone of the game window is analyzed each cycle.
    pub analysis_zone: Zone,
    /// Explicit analysis rectangle (screen coordinates); overrides the zone.
    pub analysis_region: Option<Rect>,
    /// Window-relative coordinate where watering clicks land.
    pub watering_point: Option<Point>,

    /// Replaces the built-in pest catalog when non-empty.
    pub pests: Vec<PestDefinition>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            watering_amount: 5.0,
            fertilizer_amount: 0.95,
            water_range: (5.0, 7.0),
            soil_percentage: 85,
            poll_interval_secs: 2.0,
            screenshot_interval_secs: 5.0,
            stats_interval_secs: 60.0,
            pest_cooldown_secs: 5.0,
            water_cooldown_secs: 3.0,
            fertilizer_suppress_secs: 10.0,
            water_check_every: 5,
            confidence_threshold: 0.3,
            process_name: "amazing.exe".to_string(),
            focus_game_window: true,
            analysis_zone: Zone::Bottom,
            analysis_region: None,
            watering_point: None,
            pests: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Clamps values that would break timers or modular checks.
    /// Negative intervals become zero; durations must be non-negative.
    pub fn sanitize(mut self) -> Self {
        for secs in [
            &mut self.poll_interval_secs,
            &mut self.screenshot_interval_secs,
            &mut self.stats_interval_secs,
            &mut self.pest_cooldown_secs,
            &mut self.water_cooldown_secs,
            &mut self.fertilizer_suppress_secs,
        ] {
            if !secs.is_finite() || *secs < 0.0 {
                *secs = 0.0;
            }
        }
        if !self.confidence_threshold.is_finite() || self.confidence_threshold < 0.0 {
            self.confidence_threshold = 0.0;
        }
        if self.watering_amount <= 0.0 || !self.watering_amount.is_finite() {
            self.watering_amount = 5.0;
        }
        self
    }
}

/// Loads configuration from config.json or returns defaults.
/// Looks for config.json in the same directory as the executable.
pub fn load_config() -> BotConfig {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf());

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str::<BotConfig>(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config.sanitize();
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!("Failed to read config.json: {}. Using defaults.", e));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    BotConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = BotConfig::default();
        assert_eq!(config.watering_amount, 5.0);
        assert_eq!(config.water_check_every, 5);
        assert_eq!(config.confidence_threshold, 0.3);
        assert!(config.watering_point.is_none());
        assert!(config.pests.is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: BotConfig =
            serde_json::from_str(r#"{"watering_amount": 3.5, "analysis_zone": "inventory"}"#)
                .unwrap();
        assert_eq!(config.watering_amount, 3.5);
        assert_eq!(config.analysis_zone, Zone::Inventory);
        // Untouched fields keep their defaults
        assert_eq!(config.water_cooldown_secs, 3.0);
    }

    #[test]
    fn test_sanitize_clamps_hostile_values() {
        let config: BotConfig = serde_json::from_str(
            r#"{"poll_interval_secs": -2.0, "water_cooldown_secs": -1.0, "watering_amount": -3.0}"#,
        )
        .unwrap();
        let config = config.sanitize();
        assert_eq!(config.poll_interval_secs, 0.0);
        assert_eq!(config.water_cooldown_secs, 0.0);
        assert_eq!(config.watering_amount, 5.0);
    }

    #[test]
    fn test_sanitize_keeps_valid_values() {
        let config = BotConfig::default().sanitize();
        assert_eq!(config.poll_interval_secs, 2.0);
        assert_eq!(config.water_check_every, 5);
    }

    #[test]
    fn test_watering_point_roundtrip() {
        let mut config = BotConfig::default();
        config.watering_point = Some(Point { x: 640, y: 820 });
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.watering_point, Some(Point { x: 640, y: 820 }));
    }
}
