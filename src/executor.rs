//! Action execution: turns decisions into keyboard and mouse input.
//!
//! The executor owns no collaborators; the loop passes them in per call.
//! Every action runs through a small state machine so the current activity
//! shows up in status output, and failures leave the executor back in Idle.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::catalog::PestDefinition;
use crate::collaborators::{InputActuator, WindowAccess};
use crate::inventory::{CanStatus, InventoryScanner};

/// Settle time after selecting a tool or chemical.
const SELECT_DELAY: Duration = Duration::from_millis(150);

/// Backspaces sent to clear the game's amount field before typing.
const AMOUNT_FIELD_CLEAR: usize = 8;

/// Key that selects the watering can.
const WATERING_KEY: &str = "1";

/// What the bot is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Analyzing,
    TreatingParasite,
    Watering,
    CheckingWater,
    RefillingWater,
    Error,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Analyzing => "analyzing",
            ExecutionState::TreatingParasite => "treating parasite",
            ExecutionState::Watering => "watering",
            ExecutionState::CheckingWater => "checking water",
            ExecutionState::RefillingWater => "refilling water",
            ExecutionState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub waterings: u32,
    pub treatments: u32,
    pub can_checks: u32,
    pub refills: u32,
    pub failures: u32,
}

pub struct ActionExecutor {
    pub state: ExecutionState,
    watering_point: Option<crate::collaborators::Point>,
    pub watering_count: u32,
    last_treatment: Option<Instant>,
    pub stats: ExecutorStats,
}

impl ActionExecutor {
    pub fn new(watering_point: Option<crate::collaborators::Point>) -> Self {
        Self {
            state: ExecutionState::Idle,
            watering_point,
            watering_count: 0,
            last_treatment: None,
            stats: ExecutorStats::default(),
        }
    }

    /// Treats one pest: selects the chemical (direct key binding first,
    /// inventory search as fallback), sets the dose and applies it at the
    /// watering point. A failed attempt (no way to select, or input errors)
    /// is logged and counted, never fatal.
    pub fn treat_pest(
        &mut self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
        inventory: &mut InventoryScanner,
        pest: &PestDefinition,
    ) -> bool {
        self.state = ExecutionState::TreatingParasite;

        match self.try_treat(window, input, inventory, pest) {
            Ok(true) => {
                self.last_treatment = Some(Instant::now());
                self.stats.treatments += 1;
                self.state = ExecutionState::Idle;
                crate::log(&format!(
                    "Treated {} with {:.1}L ({:?})",
                    pest.name,
                    pest.dose(),
                    pest.category
                ));
                true
            }
            Ok(false) => {
                crate::log(&format!("No way to select chemical for {}", pest.name));
                self.stats.failures += 1;
                self.state = ExecutionState::Idle;
                false
            }
            Err(e) => {
                crate::log(&format!("Treating {} failed: {}", pest.name, e));
                self.stats.failures += 1;
                self.state = ExecutionState::Idle;
                false
            }
        }
    }

    fn try_treat(
        &mut self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
        inventory: &mut InventoryScanner,
        pest: &PestDefinition,
    ) -> Result<bool> {
        let selected = if !pest.key.is_empty() {
            input.press(&pest.key)?;
            std::thread::sleep(SELECT_DELAY);
            true
        } else {
            inventory.click_chemical(window, input, &pest.name)?
        };

        if !selected {
            return Ok(false);
        }

        self.set_amount(input, pest.dose())?;
        self.apply_at_watering_point(window, input)?;
        Ok(true)
    }

    /// Waters the plant at the configured watering point. Returns false
    /// (without touching input) when no watering point is configured;
    /// input errors make the attempt a counted failure, never fatal.
    pub fn water_plant(
        &mut self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
        amount: f32,
        with_fertilizer: bool,
    ) -> bool {
        if self.watering_point.is_none() {
            crate::log("Watering skipped: no watering point configured");
            return false;
        }

        self.state = ExecutionState::Watering;

        match self.try_water(window, input, amount) {
            Ok(()) => {
                self.watering_count += 1;
                self.stats.waterings += 1;
                self.state = ExecutionState::Idle;
                crate::log(&format!(
                    "Watered plant: {:.1}L{}",
                    amount,
                    if with_fertilizer { " with fertilizer" } else { "" }
                ));
                true
            }
            Err(e) => {
                crate::log(&format!("Watering failed: {}", e));
                self.stats.failures += 1;
                self.state = ExecutionState::Idle;
                false
            }
        }
    }

    fn try_water(
        &mut self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
        amount: f32,
    ) -> Result<()> {
        input.press(WATERING_KEY)?;
        std::thread::sleep(SELECT_DELAY);
        self.set_amount(input, amount)?;
        self.apply_at_watering_point(window, input)
    }

    /// Clears the amount field and types the new value. The game uses a
    /// comma as decimal separator.
    pub fn set_amount(&mut self, input: &mut dyn InputActuator, amount: f32) -> Result<()> {
        for _ in 0..AMOUNT_FIELD_CLEAR {
            input.press("backspace")?;
        }
        let formatted = format!("{:.1}", amount).replace('.', ",");
        for ch in formatted.chars() {
            input.press(&ch.to_string())?;
        }
        Ok(())
    }

    /// Inspects the watering can through the inventory scanner.
    pub fn check_watering_can(
        &mut self,
        window: &mut dyn WindowAccess,
        inventory: &mut InventoryScanner,
    ) -> Result<CanStatus> {
        self.state = ExecutionState::CheckingWater;
        let status = inventory.watering_can_status(window)?;
        self.stats.can_checks += 1;
        self.state = ExecutionState::Idle;
        Ok(status)
    }

    /// Sends the refill key. The game walks the avatar to the well itself.
    /// Input errors make the attempt a counted failure, never fatal.
    pub fn refill_can(&mut self, input: &mut dyn InputActuator) -> bool {
        crate::log("Refilling watering can");
        self.state = ExecutionState::RefillingWater;

        let sent = match input.press("r") {
            Ok(()) => {
                std::thread::sleep(SELECT_DELAY);
                self.stats.refills += 1;
                true
            }
            Err(e) => {
                crate::log(&format!("Refill failed: {}", e));
                self.stats.failures += 1;
                false
            }
        };

        self.state = ExecutionState::Idle;
        sent
    }

    /// Panic button: escape any open dialog and stop acting. Input errors
    /// are ignored here, the point is to try.
    pub fn emergency_stop(&mut self, input: &mut dyn InputActuator) {
        crate::log("EMERGENCY STOP: escaping all dialogs");
        self.state = ExecutionState::Error;
        for _ in 0..3 {
            if let Err(e) = input.press("esc") {
                crate::log(&format!("Emergency escape failed: {}", e));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    /// True if fertilizing is wanted and no treatment happened within the
    /// suppression window. Fertilizer right after a chemical would wash the
    /// treatment out.
    pub fn fertilizer_allowed(&self, needs: bool, suppress: Duration, now: Instant) -> bool {
        if !needs {
            return false;
        }
        match self.last_treatment {
            Some(at) => now.duration_since(at) >= suppress,
            None => true,
        }
    }

    pub fn last_treatment(&self) -> Option<Instant> {
        self.last_treatment
    }

    fn apply_at_watering_point(
        &self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
    ) -> Result<()> {
        if let Some(point) = self.watering_point {
            let screen = window.to_screen(point);
            input.move_to(screen)?;
            input.click()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullTemplateMatcher, NullWindowAccess, Point};
    use std::sync::Arc;

    /// Records every injected event as a string.
    #[derive(Default)]
    struct RecordingInput {
        events: Vec<String>,
    }

    impl InputActuator for RecordingInput {
        fn move_to(&mut self, point: Point) -> Result<()> {
            self.events.push(format!("move {},{}", point.x, point.y));
            Ok(())
        }
        fn click(&mut self) -> Result<()> {
            self.events.push("click".to_string());
            Ok(())
        }
        fn press(&mut self, key: &str) -> Result<()> {
            self.events.push(format!("press {}", key));
            Ok(())
        }
    }

    fn scanner() -> InventoryScanner {
        InventoryScanner::with_templates(Arc::new(NullTemplateMatcher), None, None, Duration::ZERO)
    }

    fn aphid() -> PestDefinition {
        PestDefinition {
            name: "ТЛЯ".to_string(),
            name_variants: vec!["тля".to_string()],
            dose_range: (2.0, 2.4),
            duration_secs: 120,
            key: "2".to_string(),
            category: crate::catalog::PestCategory::Biological,
        }
    }

    #[test]
    fn test_set_amount_clears_field_and_types_comma_decimal() {
        let mut executor = ActionExecutor::new(None);
        let mut input = RecordingInput::default();

        executor.set_amount(&mut input, 2.2).unwrap();

        let backspaces = input.events.iter().filter(|e| *e == "press backspace").count();
        assert_eq!(backspaces, 8);
        let typed: Vec<&String> = input.events.iter().skip(8).collect();
        assert_eq!(typed, ["press 2", "press ,", "press 2"]);
    }

    #[test]
    fn test_set_amount_rounds_to_one_decimal() {
        let mut executor = ActionExecutor::new(None);
        let mut input = RecordingInput::default();

        executor.set_amount(&mut input, 3.25).unwrap();
        let typed: String = input.events[8..].join(" ");
        assert!(typed == "press 3 press , press 2" || typed == "press 3 press , press 3");
    }

    #[test]
    fn test_water_plant_without_point_is_skipped() {
        let mut executor = ActionExecutor::new(None);
        let mut input = RecordingInput::default();
        let mut window = NullWindowAccess::new();

        let done = executor.water_plant(&mut window, &mut input, 5.0, false);
        assert!(!done);
        assert!(input.events.is_empty());
        assert_eq!(executor.watering_count, 0);
    }

    #[test]
    fn test_water_plant_sequence() {
        let mut executor = ActionExecutor::new(Some(Point { x: 640, y: 820 }));
        let mut input = RecordingInput::default();
        let mut window = NullWindowAccess::new();

        let done = executor.water_plant(&mut window, &mut input, 5.0, false);
        assert!(done);
        assert_eq!(executor.watering_count, 1);
        assert_eq!(executor.stats.waterings, 1);
        assert_eq!(executor.state, ExecutionState::Idle);

        assert_eq!(input.events[0], "press 1");
        assert!(input.events.contains(&"move 640,820".to_string()));
        assert_eq!(input.events.last().unwrap(), "click");
    }

    #[test]
    fn test_treat_pest_uses_key_binding() {
        let mut executor = ActionExecutor::new(Some(Point { x: 10, y: 10 }));
        let mut input = RecordingInput::default();
        let mut window = NullWindowAccess::new();
        let mut inv = scanner();

        let done = executor.treat_pest(&mut window, &mut input, &mut inv, &aphid());
        assert!(done);
        assert_eq!(input.events[0], "press 2");
        assert!(executor.last_treatment().is_some());
        assert_eq!(executor.stats.treatments, 1);
    }

    #[test]
    fn test_treat_pest_without_key_falls_back_to_inventory() {
        // Null matcher never finds the chemical, so the fallback fails
        let mut executor = ActionExecutor::new(None);
        let mut input = RecordingInput::default();
        let mut window = NullWindowAccess::new();
        let mut inv = scanner();

        let mut pest = aphid();
        pest.key = String::new();

        let done = executor.treat_pest(&mut window, &mut input, &mut inv, &pest);
        assert!(!done);
        assert!(executor.last_treatment().is_none());
        assert_eq!(executor.stats.failures, 1);
        // Inventory was opened and closed while searching
        assert_eq!(
            input.events.iter().filter(|e| *e == "press tab").count(),
            2
        );
    }

    #[test]
    fn test_input_failure_is_counted_not_fatal() {
        struct DeadInput;
        impl InputActuator for DeadInput {
            fn move_to(&mut self, _p: Point) -> Result<()> {
                anyhow::bail!("injection blocked")
            }
            fn click(&mut self) -> Result<()> {
                anyhow::bail!("injection blocked")
            }
            fn press(&mut self, _key: &str) -> Result<()> {
                anyhow::bail!("injection blocked")
            }
        }

        let mut executor = ActionExecutor::new(Some(Point { x: 10, y: 10 }));
        let mut input = DeadInput;
        let mut window = NullWindowAccess::new();
        let mut inv = scanner();

        assert!(!executor.treat_pest(&mut window, &mut input, &mut inv, &aphid()));
        assert!(!executor.water_plant(&mut window, &mut input, 5.0, false));
        assert!(!executor.refill_can(&mut input));

        assert_eq!(executor.stats.failures, 3);
        assert_eq!(executor.state, ExecutionState::Idle);
        assert!(executor.last_treatment().is_none());
        assert_eq!(executor.stats.treatments, 0);
        assert_eq!(executor.stats.waterings, 0);
    }

    #[test]
    fn test_fertilizer_suppressed_after_treatment() {
        let mut executor = ActionExecutor::new(Some(Point { x: 10, y: 10 }));
        let mut input = RecordingInput::default();
        let mut window = NullWindowAccess::new();
        let mut inv = scanner();
        let suppress = Duration::from_secs(10);

        executor.treat_pest(&mut window, &mut input, &mut inv, &aphid());
        let treated_at = executor.last_treatment().unwrap();

        // 5s after the treatment: suppressed
        assert!(!executor.fertilizer_allowed(true, suppress, treated_at + Duration::from_secs(5)));
        // 15s after: allowed again
        assert!(executor.fertilizer_allowed(true, suppress, treated_at + Duration::from_secs(15)));
        // Never when fertilizer is not needed
        assert!(!executor.fertilizer_allowed(false, suppress, treated_at + Duration::from_secs(15)));
    }

    #[test]
    fn test_fertilizer_allowed_with_no_prior_treatment() {
        let executor = ActionExecutor::new(None);
        assert!(executor.fertilizer_allowed(true, Duration::from_secs(10), Instant::now()));
    }

    #[test]
    fn test_emergency_stop_presses_escape_even_when_input_fails() {
        struct FailingInput {
            presses: u32,
        }
        impl InputActuator for FailingInput {
            fn move_to(&mut self, _p: Point) -> Result<()> {
                anyhow::bail!("down")
            }
            fn click(&mut self) -> Result<()> {
                anyhow::bail!("down")
            }
            fn press(&mut self, _key: &str) -> Result<()> {
                self.presses += 1;
                anyhow::bail!("down")
            }
        }

        let mut executor = ActionExecutor::new(None);
        let mut input = FailingInput { presses: 0 };

        executor.emergency_stop(&mut input);
        assert_eq!(input.presses, 3);
        assert_eq!(executor.state, ExecutionState::Error);
    }
}
