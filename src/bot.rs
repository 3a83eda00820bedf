//! The decision loop.
//!
//! Each cycle: capture the analysis region, recognize text, extract a belief,
//! then act on it in priority order (pests, watering, fertilizer) under
//! per-action cooldowns. The loop runs on its own thread and is steered
//! through a shared [`ControlToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbaImage;

use crate::belief::{self, ScreenBelief};
use crate::catalog::PestCatalog;
use crate::collaborators::{InputActuator, OcrEngine, TemplateMatcher, WindowAccess};
use crate::config::BotConfig;
use crate::context::{GameContext, WaterLevel};
use crate::cooldown::CooldownTable;
use crate::executor::{ActionExecutor, ExecutionState};
use crate::inventory::{CanStatus, InventoryScanner};
use crate::recognition::RecognitionAdapter;

/// This many cycle errors in a row trigger an emergency stop.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Floor for the inter-cycle sleep, so a slow cycle never starves stop checks.
const MIN_CYCLE_SLEEP_SECS: f32 = 0.1;

/// Sleep while paused, between pause-flag checks.
const PAUSE_POLL: Duration = Duration::from_millis(200);

/// Shared pause/stop flags between the control thread and the loop thread.
#[derive(Clone, Default)]
pub struct ControlToken {
    inner: Arc<ControlFlags>,
}

#[derive(Default)]
struct ControlFlags {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl ControlToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct BotStats {
    pub cycles: u64,
    pub errors: u64,
    pub actions: u64,
}

/// Owns every collaborator and runs the cycle loop.
pub struct BotWorker {
    config: BotConfig,
    catalog: PestCatalog,

    window: Box<dyn WindowAccess>,
    input: Box<dyn InputActuator>,
    recognizer: RecognitionAdapter,
    inventory: InventoryScanner,
    executor: ActionExecutor,

    context: GameContext,
    cooldowns: CooldownTable,
    pub stats: BotStats,

    consecutive_errors: u32,
    started_at: Instant,
    last_screenshot: Option<Instant>,
    last_stats_log: Instant,
}

impl BotWorker {
    pub fn new(
        config: BotConfig,
        catalog: PestCatalog,
        window: Box<dyn WindowAccess>,
        input: Box<dyn InputActuator>,
        engine: Arc<dyn OcrEngine>,
        matcher: Arc<dyn TemplateMatcher>,
    ) -> Self {
        let executor = ActionExecutor::new(config.watering_point);
        Self {
            recognizer: RecognitionAdapter::new(engine),
            inventory: InventoryScanner::new(matcher),
            executor,
            context: GameContext::new(),
            cooldowns: CooldownTable::new(),
            stats: BotStats::default(),
            consecutive_errors: 0,
            started_at: Instant::now(),
            last_screenshot: None,
            last_stats_log: Instant::now(),
            config,
            catalog,
            window,
            input,
        }
    }

    /// Runs cycles until stopped or until too many consecutive errors.
    pub fn run(&mut self, token: &ControlToken) {
        if self.window.find_window(&self.config.process_name) {
            crate::log(&format!("Game window found: {}", self.config.process_name));
        } else {
            crate::log(&format!(
                "Game window '{}' not found, using full screen",
                self.config.process_name
            ));
        }

        self.started_at = Instant::now();
        self.last_stats_log = Instant::now();

        while !token.is_stopped() {
            if token.is_paused() {
                std::thread::sleep(PAUSE_POLL);
                continue;
            }

            let cycle_start = Instant::now();

            match self.cycle() {
                Ok(acted) => {
                    self.consecutive_errors = 0;
                    self.stats.cycles += 1;
                    if acted {
                        self.stats.actions += 1;
                    }
                }
                Err(e) => {
                    self.stats.cycles += 1;
                    self.stats.errors += 1;
                    self.consecutive_errors += 1;
                    crate::log(&format!(
                        "Cycle error ({}/{}): {}",
                        self.consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    ));
                    if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        crate::log("Too many consecutive errors, stopping bot");
                        self.executor.emergency_stop(self.input.as_mut());
                        break;
                    }
                }
            }

            self.maybe_log_stats();

            let elapsed = cycle_start.elapsed().as_secs_f32();
            let sleep_secs = (self.config.poll_interval_secs - elapsed).max(MIN_CYCLE_SLEEP_SECS);
            sleep_responsive(token, Duration::from_secs_f32(sleep_secs));
        }

        crate::log(&format!(
            "Bot loop finished: {} cycles, {} actions, {} errors",
            self.stats.cycles, self.stats.actions, self.stats.errors
        ));
    }

    /// One full observe-decide-act cycle. Returns true if any action ran.
    /// Capture failures propagate; they count toward the error limit.
    fn cycle(&mut self) -> Result<bool> {
        self.executor.state = ExecutionState::Analyzing;

        let region = match self.config.analysis_region {
            Some(rect) => rect,
            None => self.window.region_for_zone(self.config.analysis_zone),
        };
        let frame = self.window.capture(region)?;

        let transcript = self.recognizer.recognize(&frame);
        let belief = belief::extract(
            &transcript.text,
            transcript.confidence,
            &transcript.lines,
            &self.catalog,
        );

        self.maybe_save_screenshot(&frame);
        self.context.current_screen = belief.screen;

        let summary = belief.summary();
        if !summary.is_empty() {
            crate::log(&format!(
                "Belief ({:.2}): {}",
                belief.confidence, summary
            ));
        }

        if belief.confidence < self.config.confidence_threshold {
            self.executor.state = ExecutionState::Idle;
            return Ok(false);
        }

        if self.config.focus_game_window && !self.window.focus() {
            crate::log("Could not focus game window");
        }

        let mut acted = false;
        acted |= self.handle_pests(&belief)?;
        acted |= self.handle_watering(&belief)?;

        self.executor.state = ExecutionState::Idle;
        Ok(acted)
    }

    /// Treats every detected pest whose per-pest cooldown permits it.
    fn handle_pests(&mut self, belief: &ScreenBelief) -> Result<bool> {
        let pest_cooldown = Duration::from_secs_f32(self.config.pest_cooldown_secs);
        let mut acted = false;

        for pest in &belief.pests {
            let key = format!("parasite_{}", pest.name);
            if !self.cooldowns.permit(&key, pest_cooldown) {
                crate::log(&format!("Skipping {}: cooldown active", pest.name));
                continue;
            }

            if self.executor.treat_pest(
                self.window.as_mut(),
                self.input.as_mut(),
                &mut self.inventory,
                pest,
            ) {
                self.context.plants_treated += 1;
                self.context.record_pest(&pest.name);
                self.context
                    .record_action(&format!("treated {}", pest.name));
                acted = true;
            }
        }

        Ok(acted)
    }

    /// Watering, gated by the water cooldown. Fertilizer piggybacks on the
    /// watering pass unless a treatment happened within the suppression
    /// window (fertilizer would wash a fresh chemical out). The can is
    /// inspected after every Nth successful watering.
    fn handle_watering(&mut self, belief: &ScreenBelief) -> Result<bool> {
        let water_cooldown = Duration::from_secs_f32(self.config.water_cooldown_secs);
        let suppress = Duration::from_secs_f32(self.config.fertilizer_suppress_secs);

        let wants_water = belief.water_low || belief.water_amount.is_some();
        if !wants_water || !self.cooldowns.permit("water", water_cooldown) {
            return Ok(false);
        }

        let with_fertilizer =
            self.executor
                .fertilizer_allowed(belief.needs_fertilizer, suppress, Instant::now());
        let mut amount = belief.water_amount.unwrap_or(self.config.watering_amount);
        if with_fertilizer {
            amount += self.config.fertilizer_amount;
        }

        let watered = self.executor.water_plant(
            self.window.as_mut(),
            self.input.as_mut(),
            amount,
            with_fertilizer,
        );
        if !watered {
            return Ok(false);
        }

        self.context.plants_watered += 1;
        self.context.record_action(&format!(
            "watered {:.1}L{}",
            amount,
            if with_fertilizer { " with fertilizer" } else { "" }
        ));

        // water_check_every == 0 disables the periodic check
        if self.config.water_check_every > 0
            && self.executor.watering_count % self.config.water_check_every == 0
        {
            self.inspect_watering_can()?;
        }

        Ok(true)
    }

    fn inspect_watering_can(&mut self) -> Result<()> {
        let status = self
            .executor
            .check_watering_can(self.window.as_mut(), &mut self.inventory)?;
        self.context.water_checks += 1;
        self.context.water_level = match status {
            CanStatus::Full => WaterLevel::Full,
            CanStatus::Empty => WaterLevel::Empty,
            CanStatus::Unknown => WaterLevel::Unknown,
        };
        if status.needs_refill() && self.executor.refill_can(self.input.as_mut()) {
            self.context.record_action("refilled watering can");
        }
        Ok(())
    }

    /// Saves an analysis frame at most once per configured interval.
    /// Failures are logged, never propagated.
    fn maybe_save_screenshot(&mut self, frame: &RgbaImage) {
        let interval = Duration::from_secs_f32(self.config.screenshot_interval_secs);
        let due = match self.last_screenshot {
            Some(at) => at.elapsed() >= interval,
            None => true,
        };
        if !due {
            return;
        }

        let name = format!(
            "analysis_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = crate::paths::get_screenshots_dir().join(name);
        match frame.save(&path) {
            Ok(()) => self.last_screenshot = Some(Instant::now()),
            Err(e) => crate::log(&format!("Failed to save screenshot: {}", e)),
        }
    }

    /// Periodic statistics block, logged once per configured interval.
    fn maybe_log_stats(&mut self) {
        let interval = Duration::from_secs_f32(self.config.stats_interval_secs);
        if self.last_stats_log.elapsed() < interval {
            return;
        }
        self.last_stats_log = Instant::now();

        let uptime = self.started_at.elapsed().as_secs();
        let success_rate = if self.stats.cycles > 0 {
            (self.stats.cycles - self.stats.errors) as f64 / self.stats.cycles as f64 * 100.0
        } else {
            100.0
        };
        crate::log("=== Bot statistics ===");
        crate::log(&format!(
            "Uptime: {}m{}s | cycles: {} | actions: {} | errors: {} | success: {:.0}%",
            uptime / 60,
            uptime % 60,
            self.stats.cycles,
            self.stats.actions,
            self.stats.errors,
            success_rate
        ));
        crate::log(&self.context.status_summary());
        crate::log(&format!(
            "Executor: {} | waterings: {} | treatments: {} | can checks: {}",
            self.executor.state,
            self.executor.stats.waterings,
            self.executor.stats.treatments,
            self.executor.stats.can_checks
        ));
    }

}

/// Sleeps in short slices so a stop request interrupts the wait quickly.
fn sleep_responsive(token: &ControlToken, total: Duration) {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && !token.is_stopped() {
        std::thread::sleep(SLICE.min(deadline - Instant::now()));
    }
}

/// Handle for the bot thread: start, pause, resume, stop.
pub struct PlantCareBot {
    token: ControlToken,
    handle: Option<JoinHandle<()>>,
}

impl PlantCareBot {
    /// Spawns the loop thread and returns the control handle.
    pub fn start(mut worker: BotWorker) -> Self {
        let token = ControlToken::new();
        let thread_token = token.clone();
        let handle = std::thread::Builder::new()
            .name("bot-loop".to_string())
            .spawn(move || worker.run(&thread_token));

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                crate::log(&format!("Failed to spawn bot thread: {}", e));
                None
            }
        };

        Self { token, handle }
    }

    pub fn pause(&self) {
        self.token.pause();
        crate::log("Bot paused");
    }

    pub fn resume(&self) {
        self.token.resume();
        crate::log("Bot resumed");
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Requests a stop and waits up to five seconds for the loop thread.
    /// A thread that does not finish in time is abandoned, not joined.
    pub fn stop(&mut self) {
        self.token.stop();

        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
        }

        if handle.is_finished() {
            let _ = handle.join();
            crate::log("Bot stopped");
        } else {
            crate::log("Bot thread did not stop in time, abandoning it");
        }
    }
}

impl Drop for PlantCareBot {
    fn drop(&mut self) {
        self.stop();
    }
}
