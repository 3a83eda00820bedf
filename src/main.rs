//! Plant Care Bot
//!
//! Watches a farming-simulation game window, recognizes in-game text (pest
//! names, water and soil readings) and drives mouse/keyboard input to keep
//! the plants watered and pest-free.

mod belief;
mod bot;
mod catalog;
mod collaborators;
mod config;
mod context;
mod cooldown;
mod executor;
mod inventory;
mod paths;
mod recognition;

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use crate::bot::{BotWorker, PlantCareBot};
use crate::catalog::PestCatalog;
use crate::collaborators::{
    NullInputActuator, NullOcrEngine, NullTemplateMatcher, NullWindowAccess,
};

/// Logs a message to stdout and appends it to the session log file.
pub fn log(msg: &str) {
    let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}", timestamp, msg);
    println!("{}", line);

    let log_path = paths::get_logs_dir().join("plantcare_bot.log");
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        let _ = writeln!(file, "{}", line);
    }
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        log(&format!("PANIC: {}", info));
    }));

    paths::ensure_directories()?;

    log("=== Plant care bot starting ===");
    let config = config::load_config();

    let catalog = if config.pests.is_empty() {
        PestCatalog::builtin()
    } else {
        PestCatalog::new(config.pests.clone())
    };

    log(&format!(
        "Process: {} | zone: {:?} | poll: {:.1}s | confidence threshold: {:.2}",
        config.process_name, config.analysis_zone, config.poll_interval_secs,
        config.confidence_threshold
    ));
    log(&format!("Pest catalog: {} entries", catalog.len()));
    match config.watering_point {
        Some(p) => log(&format!("Watering point: ({}, {})", p.x, p.y)),
        None => log("Watering point not configured, watering disabled"),
    }

    // Platform backends are wired here. Until one exists for this OS the
    // null collaborators keep the loop idling.
    let worker = BotWorker::new(
        config,
        catalog,
        Box::new(NullWindowAccess::new()),
        Box::new(NullInputActuator),
        Arc::new(NullOcrEngine),
        Arc::new(NullTemplateMatcher),
    );

    let mut bot = PlantCareBot::start(worker);
    log("Commands: pause | resume | status | stop");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "pause" => bot.pause(),
            "resume" => bot.resume(),
            "status" => {
                log(&format!(
                    "Bot is {}",
                    if bot.is_running() { "running" } else { "stopped" }
                ));
            }
            "stop" | "quit" | "exit" => break,
            "" => {}
            other => log(&format!("Unknown command: {}", other)),
        }

        if !bot.is_running() {
            log("Bot loop has ended");
            break;
        }
    }

    bot.stop();
    log("=== Plant care bot finished ===");
    Ok(())
}
