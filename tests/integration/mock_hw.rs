//! Mock hardware adapter for integration tests.
//!
//! Records every actuator and tone call so tests can assert on the full
//! command history without touching real GPIO/PWM registers.  Calls arrive
//! from handler tasks and the drain thread, so the log sits behind a mutex.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use sonarbus::app::ports::{ActuatorPort, Target, ToneCommand, TonePort};
use sonarbus::drivers::rgb_switch::LABELS;
use sonarbus::error::{Error, HardwareError, Result};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Apply { position: u32, label: String },
    SetTone(ToneCommand),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    calls: Mutex<Vec<HwCall>>,
    fail_apply: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_apply: false,
        }
    }

    /// Every `apply` fails with a GPIO write error.
    pub fn failing() -> Self {
        Self {
            fail_apply: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied_labels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HwCall::Apply { label, .. } => Some(label),
                HwCall::SetTone(_) => None,
            })
            .collect()
    }

    pub fn last_label(&self) -> Option<String> {
        self.applied_labels().pop()
    }

    pub fn last_tone(&self) -> Option<ToneCommand> {
        self.calls().into_iter().rev().find_map(|c| match c {
            HwCall::SetTone(t) => Some(t),
            HwCall::Apply { .. } => None,
        })
    }

    /// Poll `cond` against this mock for up to five seconds.
    pub fn wait_for(&self, cond: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond(self)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn valid_targets(&self) -> Result<Vec<String>> {
        Ok(LABELS.iter().map(|l| (*l).to_string()).collect())
    }

    fn apply(&self, target: &Target) -> Result<()> {
        if self.fail_apply {
            return Err(Error::Hardware(HardwareError::GpioWriteFailed));
        }
        self.calls.lock().unwrap().push(HwCall::Apply {
            position: target.position,
            label: target.label.clone(),
        });
        Ok(())
    }
}

impl TonePort for MockHardware {
    fn set_tone(&self, tone: ToneCommand) -> Result<()> {
        self.calls.lock().unwrap().push(HwCall::SetTone(tone));
        Ok(())
    }
}
