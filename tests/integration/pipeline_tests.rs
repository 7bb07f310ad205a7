//! Integration tests for the ranger → bus → reactive subscriber pipeline.
//!
//! The ranger runs against the simulated HC-SR04, so every reading is the
//! obstacle distance the test sets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::mock_hw::{HwCall, MockHardware};

use sonarbus::adapters::sim::{SimBoard, SimEchoTrigger, SimObstacle, StdDelay};
use sonarbus::app::ports::ToneCommand;
use sonarbus::app::service::Pipeline;
use sonarbus::config::SystemConfig;
use sonarbus::sensors::ultrasonic::{EdgeStream, RangerSettings, TimeOfFlightRanger};

fn fast_config() -> SystemConfig {
    SystemConfig {
        sample_interval_ms: 10,
        ..SystemConfig::default()
    }
}

fn sim_ranger(
    config: &SystemConfig,
    obstacle: &SimObstacle,
) -> TimeOfFlightRanger<SimEchoTrigger, StdDelay> {
    let board = SimBoard::new("test-board");
    let edges = EdgeStream::new();
    let trigger = board
        .echo_trigger(
            &config.pins.trigger_pin,
            &config.pins.echo_interrupt_pin,
            edges.feed(),
            obstacle.clone(),
            config.speed_of_sound_m_per_s,
        )
        .unwrap();
    TimeOfFlightRanger::new(trigger, StdDelay, edges, RangerSettings::from_config(config))
}

#[test]
fn readings_drive_indicator_and_tone() {
    let config = fast_config();
    let obstacle = SimObstacle::new(0.2);
    let hw = Arc::new(MockHardware::new());
    let mut pipeline = Pipeline::start(
        sim_ranger(&config, &obstacle),
        Arc::clone(&hw),
        Arc::clone(&hw),
        &config,
    )
    .unwrap();

    assert!(hw.wait_for(|m| m.last_label().as_deref() == Some("red")));
    assert!(hw.wait_for(|m| m.last_tone()
        == Some(ToneCommand {
            duty: 0.1,
            freq_hz: Some(800)
        })));

    obstacle.set(1.5);
    assert!(hw.wait_for(|m| m.last_label().as_deref() == Some("green")
        && m.last_tone() == Some(ToneCommand::SILENT)));

    pipeline.shutdown();
    assert!(pipeline.readings() >= 2);
    assert_eq!(pipeline.bus().handler_failures(), 0);
}

#[test]
fn failing_indicator_does_not_silence_tone() {
    let config = fast_config();
    let obstacle = SimObstacle::new(0.05);
    let indicator = Arc::new(MockHardware::failing());
    let tone = Arc::new(MockHardware::new());
    let mut pipeline = Pipeline::start(
        sim_ranger(&config, &obstacle),
        Arc::clone(&indicator),
        Arc::clone(&tone),
        &config,
    )
    .unwrap();

    assert!(tone.wait_for(|m| m.calls().len() >= 3));
    assert!(
        tone.calls()
            .iter()
            .all(|c| *c == HwCall::SetTone(ToneCommand { duty: 0.05, freq_hz: Some(1000) }))
    );
    pipeline.shutdown();
    assert!(pipeline.bus().handler_failures() > 0);
    assert!(indicator.calls().is_empty());
}

#[test]
fn shutdown_is_prompt_while_ranger_waits_for_edges() {
    let config = SystemConfig {
        sample_interval_ms: 10,
        ..SystemConfig::default()
    };
    // No sensor answers: the trigger is a bare pin, so the ranger blocks
    // on its first edge wait until shutdown cancels it.
    let board = SimBoard::new("silent");
    let edges = EdgeStream::new();
    let trigger = board.output_pin(&config.pins.trigger_pin).unwrap();
    let ranger = TimeOfFlightRanger::new(trigger, StdDelay, edges, RangerSettings::default());
    let hw = Arc::new(MockHardware::new());
    let mut pipeline = Pipeline::start(ranger, Arc::clone(&hw), Arc::clone(&hw), &config).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    pipeline.shutdown();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(pipeline.readings(), 0);
    assert!(hw.calls().is_empty());
}
