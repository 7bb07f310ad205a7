//! Four-position RGB indicator switch.
//!
//! Three discrete LEDs (R/G/B), one output pin each.  Positions are
//! `off`, `red`, `green`, `blue`; selecting a position drives every pin
//! low first and then raises the selected one, so at most one LED is lit.
//!
//! The switch is shared between the command drain thread and the
//! indicator subscriber's handler tasks, hence the internal mutex.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::app::ports::{ActuatorPort, Target};
use crate::error::{Error, HardwareError, Result};

/// Position labels, indexed by position.
pub const LABELS: [&str; 4] = ["off", "red", "green", "blue"];

pub struct RgbSwitch<P> {
    name: String,
    /// Red, green, blue.
    pins: Mutex<[P; 3]>,
    position: AtomicU32,
}

impl<P: OutputPin + Send> RgbSwitch<P> {
    pub fn new(name: impl Into<String>, red: P, green: P, blue: P) -> Self {
        Self {
            name: name.into(),
            pins: Mutex::new([red, green, blue]),
            position: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last position the LEDs are known to show.  Drops to `off` when the
    /// selected pin fails to rise after the others were cleared; a failure
    /// while clearing leaves the previous value.
    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Acquire)
    }

    pub fn label(&self) -> &'static str {
        LABELS[self.position() as usize]
    }

    /// Select `position` (index into [`LABELS`]).
    pub fn set_position(&self, position: u32) -> Result<()> {
        if position as usize >= LABELS.len() {
            return Err(Error::InvalidTarget);
        }
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        for pin in pins.iter_mut() {
            pin.set_low().map_err(|e| self.write_failed(e.kind()))?;
        }
        self.position.store(0, Ordering::Release);
        if let Some(pin) = position.checked_sub(1).and_then(|i| pins.get_mut(i as usize)) {
            pin.set_high().map_err(|e| self.write_failed(e.kind()))?;
        }
        self.position.store(position, Ordering::Release);
        debug!("{}: position {} ({})", self.name, position, LABELS[position as usize]);
        Ok(())
    }

    fn write_failed(&self, kind: embedded_hal::digital::ErrorKind) -> Error {
        warn!("{}: pin write failed: {:?}", self.name, kind);
        HardwareError::GpioWriteFailed.into()
    }
}

impl<P: OutputPin + Send> ActuatorPort for RgbSwitch<P> {
    fn valid_targets(&self) -> Result<Vec<String>> {
        Ok(LABELS.iter().map(|l| (*l).to_string()).collect())
    }

    fn apply(&self, target: &Target) -> Result<()> {
        self.set_position(target.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorKind, ErrorType};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct LedPin {
        level: Arc<Mutex<bool>>,
        fail: bool,
        fail_high: bool,
    }

    impl ErrorType for LedPin {
        type Error = ErrorKind;
    }

    impl OutputPin for LedPin {
        fn set_low(&mut self) -> core::result::Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            *self.level.lock().unwrap() = false;
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), ErrorKind> {
            if self.fail || self.fail_high {
                return Err(ErrorKind::Other);
            }
            *self.level.lock().unwrap() = true;
            Ok(())
        }
    }

    fn levels(pins: &[LedPin; 3]) -> [bool; 3] {
        pins.clone().map(|p| *p.level.lock().unwrap())
    }

    #[test]
    fn exactly_one_led_follows_position() {
        let leds = [LedPin::default(), LedPin::default(), LedPin::default()];
        let sw = RgbSwitch::new("rgb", leds[0].clone(), leds[1].clone(), leds[2].clone());

        sw.apply(&Target::new(1, "red")).unwrap();
        assert_eq!(levels(&leds), [true, false, false]);
        sw.apply(&Target::new(3, "blue")).unwrap();
        assert_eq!(levels(&leds), [false, false, true]);
        sw.apply(&Target::new(0, "off")).unwrap();
        assert_eq!(levels(&leds), [false, false, false]);
        assert_eq!(sw.label(), "off");
    }

    #[test]
    fn out_of_range_position_is_invalid() {
        let sw = RgbSwitch::new("rgb", LedPin::default(), LedPin::default(), LedPin::default());
        assert_eq!(sw.set_position(4), Err(Error::InvalidTarget));
        assert_eq!(sw.position(), 0);
    }

    #[test]
    fn pin_failure_keeps_previous_position() {
        let bad = LedPin {
            fail: true,
            ..LedPin::default()
        };
        let sw = RgbSwitch::new("rgb", LedPin::default(), bad, LedPin::default());
        assert_eq!(
            sw.set_position(2),
            Err(Error::Hardware(HardwareError::GpioWriteFailed))
        );
        assert_eq!(sw.position(), 0);
    }

    #[test]
    fn failed_raise_reports_off_not_stale_colour() {
        let green = LedPin {
            fail_high: true,
            ..LedPin::default()
        };
        let leds = [LedPin::default(), green, LedPin::default()];
        let sw = RgbSwitch::new("rgb", leds[0].clone(), leds[1].clone(), leds[2].clone());
        sw.set_position(3).unwrap();
        assert_eq!(sw.label(), "blue");

        assert_eq!(
            sw.set_position(2),
            Err(Error::Hardware(HardwareError::GpioWriteFailed))
        );
        assert_eq!(levels(&leds), [false, false, false]);
        assert_eq!(sw.label(), "off");
    }
}
