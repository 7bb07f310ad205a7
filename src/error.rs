//! Unified error types for the sonarbus pipeline.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! caller-side handling uniform across the ranger, the bus and the
//! scheduler.  All variants are `Copy` so they can be handed across threads
//! and logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A pin set/read or actuator write failed.  Never retried.
    Hardware(HardwareError),
    /// A ranging sample produced an unusable result.
    Sensor(SensorError),
    /// A blocking wait was cancelled by its [`CancelToken`](crate::cancel::CancelToken).
    Cancelled,
    /// A submitted command names a target the actuator does not recognise.
    InvalidTarget,
    /// The event bus refused the event.
    Bus(BusError),
    /// The command queue refused the command.
    Queue(QueueError),
    /// A collaborator or pin could not be resolved at construction time.
    Init(&'static str),
    /// A configuration field is missing or out of range.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidTarget => write!(f, "target is not valid"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// PWM duty-cycle or frequency write failed.
    PwmWriteFailed,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
        }
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Echo edge is not later than the pulse edge (hardened pairing only).
    EdgeOrder,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EdgeOrder => write!(f, "echo edge precedes pulse edge"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Non-blocking publish found the queue at capacity.
    Full,
    /// The dispatch loop has been shut down.
    Stopped,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "queue full"),
            Self::Stopped => write!(f, "bus stopped"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Command queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The fixed-capacity heap has no free slot.
    Full,
    /// The scheduler has been shut down.
    Closed,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "command queue full"),
            Self::Closed => write!(f, "command queue closed"),
        }
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nests_sub_errors() {
        let e: Error = HardwareError::GpioWriteFailed.into();
        assert_eq!(e.to_string(), "hardware: GPIO write failed");
        let e: Error = BusError::Stopped.into();
        assert_eq!(e.to_string(), "bus: bus stopped");
        assert_eq!(Error::Config("trigger_pin is required").to_string(), "config: trigger_pin is required");
    }
}
