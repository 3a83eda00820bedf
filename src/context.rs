//! Process-lifetime game context.
//!
//! A plain owned state record mutated by the decision loop after each cycle.
//! History queues are bounded: oldest entries are evicted first.

use std::collections::VecDeque;
use std::time::Instant;

use crate::belief::ScreenKind;

const ACTION_HISTORY_CAP: usize = 20;
const PEST_HISTORY_CAP: usize = 10;

/// Coarse estimate of the watering can fill state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WaterLevel {
    Full,
    Medium,
    Low,
    Empty,
    #[default]
    Unknown,
}

impl std::fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WaterLevel::Full => "full",
            WaterLevel::Medium => "medium",
            WaterLevel::Low => "low",
            WaterLevel::Empty => "empty",
            WaterLevel::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Mutable game state carried across cycles.
#[derive(Debug, Default)]
pub struct GameContext {
    pub current_screen: ScreenKind,
    pub water_level: WaterLevel,

    pub plants_watered: u32,
    pub plants_treated: u32,
    pub water_checks: u32,
    pub total_actions: u32,

    pub last_action: String,
    pub last_action_time: Option<Instant>,

    recent_actions: VecDeque<String>,
    recent_pests: VecDeque<String>,
}

impl GameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an executed action description; evicts the oldest entry
    /// beyond the cap.
    pub fn record_action(&mut self, action: &str) {
        self.last_action = action.to_string();
        self.last_action_time = Some(Instant::now());
        self.total_actions += 1;

        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.recent_actions.push_back(format!("{} - {}", stamp, action));
        while self.recent_actions.len() > ACTION_HISTORY_CAP {
            self.recent_actions.pop_front();
        }
    }

    /// Records a detected pest name.
    pub fn record_pest(&mut self, name: &str) {
        self.recent_pests.push_back(name.to_string());
        while self.recent_pests.len() > PEST_HISTORY_CAP {
            self.recent_pests.pop_front();
        }
    }

    pub fn recent_actions(&self) -> impl Iterator<Item = &String> {
        self.recent_actions.iter()
    }

    pub fn recent_pests(&self) -> impl Iterator<Item = &String> {
        self.recent_pests.iter()
    }

    /// One-line status used by the periodic stats block.
    pub fn status_summary(&self) -> String {
        format!(
            "screen: {:?} | watered: {} | treated: {} | water: {} | actions: {}",
            self.current_screen,
            self.plants_watered,
            self.plants_treated,
            self.water_level,
            self.total_actions
        )
    }
}
