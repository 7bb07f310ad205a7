//! System configuration parameters
//!
//! All tunable parameters for the ranging pipeline and the command
//! scheduler.  Loaded from JSON on the host; any field left out of the
//! document keeps its default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on configurable tone bands.
pub const MAX_TONE_BANDS: usize = 4;

/// Named pins and collaborators, resolved against the board at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub board_name: String,
    /// Ultrasonic trigger output.
    pub trigger_pin: String,
    /// Echo input whose interrupt feeds the edge stream.
    pub echo_interrupt_pin: String,
    pub rgb_switch_name: String,
    pub red_pin: String,
    pub green_pin: String,
    pub blue_pin: String,
    pub buzzer_pin: String,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            board_name: "board".into(),
            trigger_pin: "gpio15".into(),
            echo_interrupt_pin: "gpio16".into(),
            rgb_switch_name: "rgb".into(),
            red_pin: "gpio11".into(),
            green_pin: "gpio12".into(),
            blue_pin: "gpio13".into(),
            buzzer_pin: "gpio18".into(),
        }
    }
}

impl PinConfig {
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.trigger_pin, "trigger_pin is required"),
            (&self.echo_interrupt_pin, "echo_interrupt_pin is required"),
            (&self.board_name, "board_name is required"),
            (&self.rgb_switch_name, "rgb_switch_name is required"),
            (&self.buzzer_pin, "buzzer_pin is required"),
            (&self.red_pin, "red_pin is required"),
            (&self.green_pin, "green_pin is required"),
            (&self.blue_pin, "blue_pin is required"),
        ];
        for (value, msg) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(msg));
            }
        }
        Ok(())
    }
}

/// One distance band of the tone rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneBand {
    /// Upper edge of the band in metres.
    pub max_m: f64,
    /// Whether a reading equal to `max_m` still falls in this band.
    pub inclusive: bool,
    /// PWM duty fraction, 0.0–1.0.
    pub duty: f32,
    pub freq_hz: u32,
}

/// Distance thresholds for the reactive subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Readings below this turn the indicator red, otherwise green.
    pub indicator_near_m: f64,
    /// Checked in order; beyond the last band the buzzer is silent.
    pub tone_bands: heapless::Vec<ToneBand, MAX_TONE_BANDS>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        let bands = [
            ToneBand { max_m: 0.1, inclusive: false, duty: 0.05, freq_hz: 1000 },
            ToneBand { max_m: 0.4, inclusive: true, duty: 0.1, freq_hz: 800 },
            ToneBand { max_m: 0.7, inclusive: true, duty: 0.2, freq_hz: 500 },
        ];
        Self {
            indicator_near_m: 0.3,
            tone_bands: bands.into_iter().collect(),
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.indicator_near_m.is_nan() || self.indicator_near_m <= 0.0 {
            return Err(Error::Config("indicator_near_m must be positive"));
        }
        let mut prev = 0.0;
        for band in &self.tone_bands {
            if band.max_m.is_nan() || band.max_m <= prev {
                return Err(Error::Config("tone_bands must be ascending and positive"));
            }
            if !(0.0..=1.0).contains(&band.duty) {
                return Err(Error::Config("tone band duty must be within 0..=1"));
            }
            if band.freq_hz == 0 {
                return Err(Error::Config("tone band freq_hz must be non-zero"));
            }
            prev = band.max_m;
        }
        Ok(())
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub pins: PinConfig,

    // --- Timing ---
    /// Ranger sampling interval (milliseconds)
    pub sample_interval_ms: u32,
    /// Command drain period (milliseconds)
    pub drain_period_ms: u32,

    // --- Ranger ---
    /// Trigger hold time (microseconds, ≥ 10)
    pub trigger_pulse_us: u32,
    pub speed_of_sound_m_per_s: f64,
    /// Discard stale edges and reject out-of-order pairs.
    pub harden_edge_pairing: bool,

    pub rules: RuleConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),

            // Timing
            sample_interval_ms: 100, // 10 Hz
            drain_period_ms: 5000,   // one command per 5 s

            // Ranger
            trigger_pulse_us: 10,
            speed_of_sound_m_per_s: 343.0,
            harden_edge_pairing: false,

            rules: RuleConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Parse a JSON document.  Missing fields take their defaults; the
    /// result is not validated.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            log::error!("config: parse failed: {}", e);
            Error::Config("malformed config document")
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.pins.validate()?;
        if self.sample_interval_ms == 0 {
            return Err(Error::Config("sample_interval_ms must be non-zero"));
        }
        if self.drain_period_ms == 0 {
            return Err(Error::Config("drain_period_ms must be non-zero"));
        }
        if self.trigger_pulse_us < 10 {
            return Err(Error::Config("trigger_pulse_us must be at least 10"));
        }
        if !self.speed_of_sound_m_per_s.is_finite() || self.speed_of_sound_m_per_s <= 0.0 {
            return Err(Error::Config("speed_of_sound_m_per_s must be positive"));
        }
        self.rules.validate()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sample_interval_ms))
    }

    pub fn drain_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.drain_period_ms))
    }
}
