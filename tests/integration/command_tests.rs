//! Integration tests for the JSON command path: parse → scheduler → actuator.

use serde_json::json;

use super::mock_hw::MockHardware;

use sonarbus::app::commands::{AppCommand, CommandResponse, handle_command};
use sonarbus::error::Error;
use sonarbus::scheduler::CommandScheduler;

fn run(sched: &CommandScheduler<MockHardware>, cmd: serde_json::Value) -> Result<CommandResponse, Error> {
    AppCommand::from_json(&cmd).and_then(|c| handle_command(sched, c))
}

#[test]
fn submit_then_get_length() {
    let sched = CommandScheduler::new(MockHardware::new());
    assert_eq!(run(&sched, json!({"label": "red", "priority": "2"})), Ok(CommandResponse::Accepted));
    assert_eq!(run(&sched, json!({"label": "blue", "priority": "1"})), Ok(CommandResponse::Accepted));

    let len = run(&sched, json!({"get_length": null})).unwrap();
    assert_eq!(len.to_json(), json!({"length": 2}));

    sched.drain_once().unwrap();
    assert_eq!(sched.actuator().applied_labels(), vec!["blue"]);
    assert_eq!(run(&sched, json!({"get_length": 1})), Ok(CommandResponse::Length(1)));
}

#[test]
fn rejected_commands_leave_queue_untouched() {
    let sched = CommandScheduler::new(MockHardware::new());
    let err = run(&sched, json!({"label": "cyan", "priority": "1"})).unwrap_err();
    assert_eq!(err, Error::InvalidTarget);
    assert_eq!(err.to_string(), "target is not valid");

    assert_eq!(
        run(&sched, json!({"label": "red", "priority": "high"})),
        Err(Error::Config("priority must be an integer"))
    );
    assert_eq!(
        run(&sched, json!({"priority": "1"})),
        Err(Error::Config("label is required"))
    );
    assert!(sched.is_empty());
}
