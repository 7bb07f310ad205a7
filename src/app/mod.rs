//! Application core: reactive rules, command intake and pipeline wiring.
//!
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer testable without real peripherals.

pub mod commands;
pub mod ports;
pub mod rules;
pub mod service;
