//! Port traits: the boundary between the pipeline and the hardware it drives.
//!
//! ```text
//!   Scheduler / reactive rules ──▶ Port trait ──▶ driver (RGB switch, buzzer, mock)
//! ```
//!
//! Drivers implement these traits; the scheduler and the bus subscribers
//! consume them via generics, so the domain core never touches pins
//! directly.  Ports take `&self` because a single actuator is shared
//! between the drain thread and concurrent handler tasks; implementations
//! serialise access internally.

use std::sync::Arc;

use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Targets
// ───────────────────────────────────────────────────────────────

/// A resolved actuation target: the position index among the actuator's
/// labels plus the label itself for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub position: u32,
    pub label: String,
}

impl Target {
    pub fn new(position: u32, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → positional actuator)
// ───────────────────────────────────────────────────────────────

/// A multi-position actuator such as the RGB indicator switch.
pub trait ActuatorPort: Send + Sync {
    /// Ordered labels of every position the actuator accepts.  Queried
    /// fresh on every submit.
    fn valid_targets(&self) -> Result<Vec<String>>;

    /// Drive the actuator to `target`.  Failures are returned, never retried.
    fn apply(&self, target: &Target) -> Result<()>;
}

impl<A: ActuatorPort + ?Sized> ActuatorPort for Arc<A> {
    fn valid_targets(&self) -> Result<Vec<String>> {
        (**self).valid_targets()
    }

    fn apply(&self, target: &Target) -> Result<()> {
        (**self).apply(target)
    }
}

// ───────────────────────────────────────────────────────────────
// Tone port (domain → buzzer)
// ───────────────────────────────────────────────────────────────

/// Duty cycle plus an optional frequency.  `freq_hz == None` leaves the
/// output frequency where it was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCommand {
    /// Fraction of full duty, 0.0–1.0.
    pub duty: f32,
    pub freq_hz: Option<u32>,
}

impl ToneCommand {
    pub const SILENT: Self = Self {
        duty: 0.0,
        freq_hz: None,
    };

    pub fn is_silent(&self) -> bool {
        self.duty <= 0.0
    }
}

/// A PWM tone generator.
pub trait TonePort: Send + Sync {
    fn set_tone(&self, tone: ToneCommand) -> Result<()>;
}

impl<T: TonePort + ?Sized> TonePort for Arc<T> {
    fn set_tone(&self, tone: ToneCommand) -> Result<()> {
        (**self).set_tone(tone)
    }
}
