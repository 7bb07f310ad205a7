//! Integration tests for the command scheduler driving a real RGB switch
//! on simulated pins, sharing it with the indicator the way the binary
//! does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::mock_hw::MockHardware;

use sonarbus::adapters::sim::{SimBoard, SimPin};
use sonarbus::drivers::rgb_switch::RgbSwitch;
use sonarbus::error::Error;
use sonarbus::scheduler::CommandScheduler;

fn switch() -> (Arc<RgbSwitch<SimPin>>, [SimPin; 3]) {
    let board = SimBoard::new("test-board");
    let pins = [
        board.output_pin("gpio11").unwrap(),
        board.output_pin("gpio12").unwrap(),
        board.output_pin("gpio13").unwrap(),
    ];
    let sw = RgbSwitch::new("rgb", pins[0].clone(), pins[1].clone(), pins[2].clone());
    (Arc::new(sw), pins)
}

fn lit(pins: &[SimPin; 3]) -> [bool; 3] {
    [pins[0].is_high(), pins[1].is_high(), pins[2].is_high()]
}

#[test]
fn priorities_5_1_3_apply_as_1_3_5() {
    let hw = MockHardware::new();
    let sched = CommandScheduler::new(hw);
    sched.submit("blue", 5).unwrap();
    sched.submit("red", 1).unwrap();
    sched.submit("green", 3).unwrap();

    for _ in 0..3 {
        sched.drain_once().unwrap();
    }
    assert_eq!(sched.actuator().applied_labels(), vec!["red", "green", "blue"]);
}

#[test]
fn drain_drives_switch_pins() {
    let (sw, pins) = switch();
    let sched = CommandScheduler::new(Arc::clone(&sw));
    sched.submit("green", 2).unwrap();
    sched.submit("red", 1).unwrap();

    sched.drain_once().unwrap();
    assert_eq!(lit(&pins), [true, false, false]);
    assert_eq!(sched.len(), 1);

    sched.drain_once().unwrap();
    assert_eq!(lit(&pins), [false, true, false]);
    assert_eq!(sw.label(), "green");
}

#[test]
fn invalid_label_is_rejected() {
    let (sw, _pins) = switch();
    let sched = CommandScheduler::new(sw);
    sched.submit("red", 1).unwrap();
    assert_eq!(sched.submit("ultraviolet", 1), Err(Error::InvalidTarget));
    assert_eq!(sched.len(), 1);
}

#[test]
fn timed_drain_applies_one_command_per_period() {
    let (sw, pins) = switch();
    let sched = CommandScheduler::new(Arc::clone(&sw));
    sched.submit("blue", 0).unwrap();
    sched.submit("red", 9).unwrap();
    sched.start(Duration::from_millis(150)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while lit(&pins) != [false, false, true] && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    // First tick applied exactly one command; the second is still queued.
    assert_eq!(lit(&pins), [false, false, true]);
    assert_eq!(sched.len(), 1);

    while !sched.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    sched.shutdown();
    assert_eq!(lit(&pins), [true, false, false]);
}
