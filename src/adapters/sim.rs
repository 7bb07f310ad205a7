//! Host simulation of the ranging board.
//!
//! Pins and PWM channels keep their state in shared atomics so a test or
//! the demo binary can observe them from another thread.  The simulated
//! HC-SR04 ([`SimEchoTrigger`]) watches the trigger pin and, at the end of
//! every pulse, feeds the edge pair a real sensor would produce for the
//! current [`SimObstacle`] distance.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{self, ErrorType as PwmErrorType, SetDutyCycle};
use log::{debug, error};

use crate::adapters::time::MonotonicClock;
use crate::drivers::buzzer::FrequencyControl;
use crate::error::{Error, Result};
use crate::pins;
use crate::sensors::ultrasonic::{Edge, EdgeFeed};

// ── Digital output ───────────────────────────────────────────

/// Output pin backed by an atomic level.  Clones share the level.
#[derive(Debug, Clone)]
pub struct SimPin {
    gpio: i32,
    level: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            level: Arc::new(AtomicBool::new(false)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    fn write(&self, high: bool) -> core::result::Result<(), digital::ErrorKind> {
        if self.fail.load(Ordering::Acquire) {
            return Err(digital::ErrorKind::Other);
        }
        self.level.store(high, Ordering::Release);
        Ok(())
    }
}

impl DigitalErrorType for SimPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.write(true)
    }
}

// ── PWM ──────────────────────────────────────────────────────

/// 10-bit PWM channel with a tunable carrier.  Clones share state.
#[derive(Debug, Clone)]
pub struct SimPwm {
    gpio: i32,
    duty: Arc<AtomicU16>,
    freq_hz: Arc<AtomicU32>,
}

impl SimPwm {
    pub const MAX_DUTY: u16 = 1023;

    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            duty: Arc::new(AtomicU16::new(0)),
            freq_hz: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Acquire)
    }

    pub fn freq_hz(&self) -> u32 {
        self.freq_hz.load(Ordering::Acquire)
    }
}

impl PwmErrorType for SimPwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Self::Error> {
        self.duty.store(duty.min(Self::MAX_DUTY), Ordering::Release);
        Ok(())
    }
}

impl FrequencyControl for SimPwm {
    fn set_frequency_hz(&mut self, hz: u32) -> core::result::Result<(), Self::Error> {
        if hz == 0 {
            return Err(pwm::ErrorKind::Other);
        }
        self.freq_hz.store(hz, Ordering::Release);
        Ok(())
    }
}

// ── Delay ────────────────────────────────────────────────────

/// `DelayNs` over `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ── Simulated HC-SR04 ────────────────────────────────────────

/// Distance to the simulated obstacle in metres.  Clones share the value.
#[derive(Debug, Clone)]
pub struct SimObstacle(Arc<AtomicU64>);

impl SimObstacle {
    pub fn new(distance_m: f64) -> Self {
        Self(Arc::new(AtomicU64::new(distance_m.to_bits())))
    }

    pub fn set(&self, distance_m: f64) {
        self.0.store(distance_m.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Trigger pin wired to a simulated sensor.  Each high→low transition
/// emits a pulse edge and, one round trip later, an echo edge.
pub struct SimEchoTrigger {
    pin: SimPin,
    echo_gpio: i32,
    feed: EdgeFeed,
    obstacle: SimObstacle,
    clock: MonotonicClock,
    speed_m_per_s: f64,
}

impl SimEchoTrigger {
    pub fn new(
        pin: SimPin,
        echo_gpio: i32,
        feed: EdgeFeed,
        obstacle: SimObstacle,
        speed_m_per_s: f64,
    ) -> Self {
        Self {
            pin,
            echo_gpio,
            feed,
            obstacle,
            clock: MonotonicClock::new(),
            speed_m_per_s,
        }
    }

    fn emit_echo(&self) {
        let pulse_ns = self.clock.now_ns();
        let round_trip_s = 2.0 * self.obstacle.get().max(0.0) / self.speed_m_per_s;
        let echo_ns = pulse_ns + (round_trip_s * 1e9).round() as u64;
        let pushed = self.feed.push(Edge {
            pin: self.echo_gpio,
            timestamp_ns: pulse_ns,
            high: true,
        }) && self.feed.push(Edge {
            pin: self.echo_gpio,
            timestamp_ns: echo_ns,
            high: false,
        });
        if !pushed {
            debug!("sim: echo edge dropped (channel full)");
        }
    }
}

impl DigitalErrorType for SimEchoTrigger {
    type Error = digital::ErrorKind;
}

impl OutputPin for SimEchoTrigger {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        let was_high = self.pin.is_high();
        self.pin.write(false)?;
        if was_high {
            self.emit_echo();
        }
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.pin.write(true)
    }
}

// ── Board ────────────────────────────────────────────────────

/// Resolves configured pin names to simulated peripherals.
#[derive(Debug, Clone)]
pub struct SimBoard {
    name: String,
}

impl SimBoard {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn gpio(&self, pin_name: &str) -> Result<i32> {
        pins::resolve(pin_name).ok_or_else(|| {
            error!("{}: pin '{}' is not routed on this board", self.name, pin_name);
            Error::Init("unknown pin")
        })
    }

    pub fn output_pin(&self, pin_name: &str) -> Result<SimPin> {
        self.gpio(pin_name).map(SimPin::new)
    }

    pub fn pwm(&self, pin_name: &str) -> Result<SimPwm> {
        self.gpio(pin_name).map(SimPwm::new)
    }

    /// Trigger output plus the simulated sensor answering on `echo_pin`.
    pub fn echo_trigger(
        &self,
        trigger_pin: &str,
        echo_pin: &str,
        feed: EdgeFeed,
        obstacle: SimObstacle,
        speed_m_per_s: f64,
    ) -> Result<SimEchoTrigger> {
        let pin = self.output_pin(trigger_pin)?;
        let echo_gpio = self.gpio(echo_pin)?;
        Ok(SimEchoTrigger::new(pin, echo_gpio, feed, obstacle, speed_m_per_s))
    }
}
