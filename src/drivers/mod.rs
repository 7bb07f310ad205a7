//! Actuator drivers and thread helpers.

pub mod buzzer;
pub mod rgb_switch;
pub mod task;
