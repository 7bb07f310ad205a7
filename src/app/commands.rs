//! Inbound commands to the command scheduler.
//!
//! External adapters (serial console, RPC) hand over loosely-typed JSON
//! maps.  Two shapes are understood:
//!
//! ```text
//!   {"get_length": <anything>}              → report pending count
//!   {"label": "red", "priority": "3"}       → queue a command
//! ```
//!
//! `priority` is accepted as an integer or as a string holding one.

use serde_json::{Value, json};

use crate::app::ports::ActuatorPort;
use crate::error::{Error, Result};
use crate::scheduler::CommandScheduler;

/// Commands that external adapters can send into the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Queue `label` at `priority` (lower = sooner).
    Submit { label: String, priority: i32 },

    /// Report how many commands are pending.
    GetLength,
}

/// What [`handle_command`] returns to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponse {
    Accepted,
    Length(usize),
}

impl CommandResponse {
    /// Wire form: `null` for an accepted submit, `{"length": n}` otherwise.
    pub fn to_json(self) -> Value {
        match self {
            Self::Accepted => Value::Null,
            Self::Length(n) => json!({ "length": n }),
        }
    }
}

impl AppCommand {
    pub fn from_json(cmd: &Value) -> Result<Self> {
        let map = cmd
            .as_object()
            .ok_or(Error::Config("command must be an object"))?;

        if map.contains_key("get_length") {
            return Ok(Self::GetLength);
        }

        let label = map
            .get("label")
            .and_then(Value::as_str)
            .ok_or(Error::Config("label is required"))?;

        let priority = match map.get("priority") {
            None | Some(Value::Null) => return Err(Error::Config("priority is required")),
            Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
            Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Some(_) => None,
        }
        .ok_or(Error::Config("priority must be an integer"))?;

        Ok(Self::Submit {
            label: label.to_owned(),
            priority,
        })
    }
}

/// Execute `cmd` against `scheduler`.
pub fn handle_command<A: ActuatorPort + 'static>(
    scheduler: &CommandScheduler<A>,
    cmd: AppCommand,
) -> Result<CommandResponse> {
    match cmd {
        AppCommand::GetLength => Ok(CommandResponse::Length(scheduler.len())),
        AppCommand::Submit { label, priority } => {
            scheduler.submit(&label, priority)?;
            Ok(CommandResponse::Accepted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_shapes() {
        assert_eq!(
            AppCommand::from_json(&json!({"get_length": true})),
            Ok(AppCommand::GetLength)
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": "red", "priority": "3"})),
            Ok(AppCommand::Submit {
                label: "red".into(),
                priority: 3
            })
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": "blue", "priority": -2})),
            Ok(AppCommand::Submit {
                label: "blue".into(),
                priority: -2
            })
        );
    }

    #[test]
    fn reports_missing_and_malformed_fields() {
        assert_eq!(
            AppCommand::from_json(&json!({"priority": "1"})),
            Err(Error::Config("label is required"))
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": 5, "priority": "1"})),
            Err(Error::Config("label is required"))
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": "red"})),
            Err(Error::Config("priority is required"))
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": "red", "priority": "soon"})),
            Err(Error::Config("priority must be an integer"))
        );
        assert_eq!(
            AppCommand::from_json(&json!({"label": "red", "priority": 1.5})),
            Err(Error::Config("priority must be an integer"))
        );
        assert_eq!(
            AppCommand::from_json(&json!(["red", 1])),
            Err(Error::Config("command must be an object"))
        );
    }

    #[test]
    fn response_wire_form() {
        assert_eq!(CommandResponse::Accepted.to_json(), Value::Null);
        assert_eq!(CommandResponse::Length(4).to_json(), json!({"length": 4}));
    }
}
