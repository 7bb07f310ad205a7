//! Reactive rules: pure `distance -> command` functions.
//!
//! Each bus subscriber wraps one of these and forwards the result to its
//! port.  Thresholds come from [`RuleConfig`].

use crate::config::RuleConfig;
use crate::drivers::rgb_switch::LABELS;

use super::ports::{Target, ToneCommand};

/// Indicator colours, in switch position order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Off = 0,
    Red = 1,
    Green = 2,
    Blue = 3,
}

impl IndicatorColor {
    pub fn position(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        LABELS[self as usize]
    }

    pub fn target(self) -> Target {
        Target::new(self.position(), self.label())
    }
}

/// Red when something is closer than `indicator_near_m`, green otherwise.
pub fn indicator_for(distance_m: f64, rules: &RuleConfig) -> IndicatorColor {
    if distance_m < rules.indicator_near_m {
        IndicatorColor::Red
    } else {
        IndicatorColor::Green
    }
}

/// First tone band containing `distance_m`; silent beyond the last band.
pub fn tone_for(distance_m: f64, rules: &RuleConfig) -> ToneCommand {
    rules
        .tone_bands
        .iter()
        .find(|band| {
            if band.inclusive {
                distance_m <= band.max_m
            } else {
                distance_m < band.max_m
            }
        })
        .map_or(ToneCommand::SILENT, |band| ToneCommand {
            duty: band.duty,
            freq_hz: Some(band.freq_hz),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duty: f32, hz: u32) -> ToneCommand {
        ToneCommand {
            duty,
            freq_hz: Some(hz),
        }
    }

    #[test]
    fn indicator_threshold() {
        let rules = RuleConfig::default();
        assert_eq!(indicator_for(0.05, &rules), IndicatorColor::Red);
        assert_eq!(indicator_for(0.299, &rules), IndicatorColor::Red);
        assert_eq!(indicator_for(0.3, &rules), IndicatorColor::Green);
        assert_eq!(indicator_for(2.0, &rules), IndicatorColor::Green);
        assert_eq!(IndicatorColor::Green.target(), Target::new(2, "green"));
    }

    #[test]
    fn tone_bands_and_boundaries() {
        let rules = RuleConfig::default();
        assert_eq!(tone_for(0.05, &rules), tone(0.05, 1000));
        assert_eq!(tone_for(0.1, &rules), tone(0.1, 800));
        assert_eq!(tone_for(0.4, &rules), tone(0.1, 800));
        assert_eq!(tone_for(0.41, &rules), tone(0.2, 500));
        assert_eq!(tone_for(0.7, &rules), tone(0.2, 500));
        assert_eq!(tone_for(0.71, &rules), ToneCommand::SILENT);
    }
}
