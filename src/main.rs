//! Sonarbus host simulation.
//!
//! Wires the ranger, the event bus and the command scheduler to a
//! simulated board, sweeps an obstacle towards the sensor while a few
//! queued indicator commands drain, then shuts everything down.
//!
//! Usage: `sonarbus [config.json]`

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::json;

use sonarbus::adapters::sim::{SimBoard, SimObstacle, StdDelay};
use sonarbus::app::commands::{AppCommand, handle_command};
use sonarbus::app::service::Pipeline;
use sonarbus::config::SystemConfig;
use sonarbus::drivers::buzzer::Buzzer;
use sonarbus::drivers::rgb_switch::RgbSwitch;
use sonarbus::scheduler::CommandScheduler;
use sonarbus::sensors::ultrasonic::{EdgeStream, RangerSettings, TimeOfFlightRanger};

/// Obstacle positions (metres) visited by the demo sweep.
const SWEEP_M: [f64; 6] = [1.0, 0.6, 0.35, 0.2, 0.08, 0.5];
const SWEEP_STEP: Duration = Duration::from_millis(400);

fn load_config() -> Result<SystemConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("Config: defaults");
        return Ok(SystemConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = SystemConfig::from_json(&text).with_context(|| format!("parsing {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  Sonarbus v{}  (host simulation)   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config()?;
    config.validate().context("invalid configuration")?;
    let pins = &config.pins;

    // ── Hardware ──────────────────────────────────────────────
    let board = SimBoard::new(pins.board_name.clone());
    let obstacle = SimObstacle::new(SWEEP_M[0]);
    let edges = EdgeStream::new();
    let trigger = board.echo_trigger(
        &pins.trigger_pin,
        &pins.echo_interrupt_pin,
        edges.feed(),
        obstacle.clone(),
        config.speed_of_sound_m_per_s,
    )?;
    let indicator = Arc::new(RgbSwitch::new(
        pins.rgb_switch_name.clone(),
        board.output_pin(&pins.red_pin)?,
        board.output_pin(&pins.green_pin)?,
        board.output_pin(&pins.blue_pin)?,
    ));
    let buzzer_pwm = board.pwm(&pins.buzzer_pin)?;
    let buzzer = Arc::new(Buzzer::new(buzzer_pwm.clone()));

    if config.harden_edge_pairing {
        warn!("Edge pairing hardening enabled: stale edges are discarded");
    }
    let ranger = TimeOfFlightRanger::new(
        trigger,
        StdDelay,
        edges,
        RangerSettings::from_config(&config),
    );

    // ── Services ──────────────────────────────────────────────
    let mut pipeline = Pipeline::start(ranger, Arc::clone(&indicator), buzzer, &config)?;
    let scheduler = CommandScheduler::new(Arc::clone(&indicator));
    scheduler.start(config.drain_period())?;

    for cmd in [
        json!({"label": "blue", "priority": "3"}),
        json!({"label": "red", "priority": "1"}),
        json!({"label": "magenta", "priority": "0"}),
        json!({"label": "green", "priority": 2}),
        json!({"get_length": true}),
    ] {
        let outcome = AppCommand::from_json(&cmd).and_then(|c| handle_command(&scheduler, c));
        match outcome {
            Ok(resp) => info!("Command {} → {}", cmd, resp.to_json()),
            Err(e) => warn!("Command {} rejected: {}", cmd, e),
        }
    }

    // ── Demo ──────────────────────────────────────────────────
    for distance in SWEEP_M {
        obstacle.set(distance);
        std::thread::sleep(SWEEP_STEP);
        info!(
            "Obstacle {:.2} m → indicator={} buzzer duty={} freq={}Hz",
            distance,
            indicator.label(),
            buzzer_pwm.duty(),
            buzzer_pwm.freq_hz()
        );
    }

    let deadline = Instant::now() + config.drain_period() * (scheduler.len() as u32 + 1);
    while !scheduler.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    // ── Shutdown ──────────────────────────────────────────────
    scheduler.shutdown();
    pipeline.shutdown();
    info!(
        "Done: {} readings, {} handler failure(s)",
        pipeline.readings(),
        pipeline.bus().handler_failures()
    );
    Ok(())
}
