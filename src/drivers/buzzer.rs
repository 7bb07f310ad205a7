//! Piezo buzzer driver.
//!
//! Volume is the PWM duty cycle, pitch is the PWM frequency.  Duty is
//! written first, then the frequency when the command carries one.  A
//! silent command only zeroes the duty and leaves the frequency alone.
//!
//! ## Dual-target design
//!
//! Any `embedded_hal::pwm::SetDutyCycle` channel that can also retune its
//! timer ([`FrequencyControl`]) will do: the LEDC channel on the board,
//! `SimPwm` on the host.

use std::sync::{Mutex, PoisonError};

use embedded_hal::pwm::{Error as _, ErrorType, SetDutyCycle};
use log::{debug, warn};

use crate::app::ports::{ToneCommand, TonePort};
use crate::error::{Error, HardwareError, Result};

/// A PWM output whose carrier frequency can be changed at runtime.
pub trait FrequencyControl: ErrorType {
    fn set_frequency_hz(&mut self, hz: u32) -> core::result::Result<(), Self::Error>;
}

pub struct Buzzer<P> {
    pwm: Mutex<P>,
    current: Mutex<ToneCommand>,
}

impl<P: SetDutyCycle + FrequencyControl + Send> Buzzer<P> {
    pub fn new(pwm: P) -> Self {
        Self {
            pwm: Mutex::new(pwm),
            current: Mutex::new(ToneCommand::SILENT),
        }
    }

    /// Last tone written successfully.
    pub fn current(&self) -> ToneCommand {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, tone: ToneCommand) -> Result<()> {
        let mut pwm = self.pwm.lock().unwrap_or_else(PoisonError::into_inner);
        let max = pwm.max_duty_cycle();
        let duty = (f32::from(max) * tone.duty.clamp(0.0, 1.0)).round() as u16;
        pwm.set_duty_cycle(duty).map_err(|e| pwm_failed(e.kind()))?;
        if let Some(hz) = tone.freq_hz {
            pwm.set_frequency_hz(hz).map_err(|e| pwm_failed(e.kind()))?;
        }
        debug!("buzzer: duty={}/{} freq={:?}", duty, max, tone.freq_hz);
        Ok(())
    }
}

fn pwm_failed(kind: embedded_hal::pwm::ErrorKind) -> Error {
    warn!("buzzer: PWM write failed: {:?}", kind);
    HardwareError::PwmWriteFailed.into()
}

impl<P: SetDutyCycle + FrequencyControl + Send> TonePort for Buzzer<P> {
    fn set_tone(&self, tone: ToneCommand) -> Result<()> {
        self.write(tone)?;
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = ToneCommand {
            duty: tone.duty,
            freq_hz: tone.freq_hz.or(current.freq_hz),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::pwm::ErrorKind;

    #[derive(Default)]
    struct FakePwm {
        duty: u16,
        freq: Option<u32>,
        writes: Vec<&'static str>,
        fail: bool,
    }

    impl ErrorType for FakePwm {
        type Error = ErrorKind;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            self.writes.push("duty");
            self.duty = duty;
            Ok(())
        }
    }

    impl FrequencyControl for FakePwm {
        fn set_frequency_hz(&mut self, hz: u32) -> core::result::Result<(), ErrorKind> {
            self.writes.push("freq");
            self.freq = Some(hz);
            Ok(())
        }
    }

    #[test]
    fn duty_then_frequency() {
        let buzzer = Buzzer::new(FakePwm::default());
        buzzer
            .set_tone(ToneCommand {
                duty: 0.2,
                freq_hz: Some(500),
            })
            .unwrap();
        let pwm = buzzer.pwm.lock().unwrap();
        assert_eq!(pwm.duty, 200);
        assert_eq!(pwm.freq, Some(500));
        assert_eq!(pwm.writes, vec!["duty", "freq"]);
    }

    #[test]
    fn silence_keeps_last_frequency() {
        let buzzer = Buzzer::new(FakePwm::default());
        buzzer
            .set_tone(ToneCommand {
                duty: 0.1,
                freq_hz: Some(800),
            })
            .unwrap();
        buzzer.set_tone(ToneCommand::SILENT).unwrap();
        assert_eq!(buzzer.pwm.lock().unwrap().duty, 0);
        assert_eq!(buzzer.current().freq_hz, Some(800));
        assert!(buzzer.current().is_silent());
    }

    #[test]
    fn pwm_failure_is_hardware_error() {
        let buzzer = Buzzer::new(FakePwm {
            fail: true,
            ..FakePwm::default()
        });
        assert_eq!(
            buzzer.set_tone(ToneCommand::SILENT),
            Err(Error::Hardware(HardwareError::PwmWriteFailed))
        );
    }
}
