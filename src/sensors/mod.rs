//! Sensor subsystem.
//!
//! Only one sensor today: the ultrasonic ranger, whose readings are
//! published on the bus under [`DISTANCE_TOPIC`].

pub mod ultrasonic;

/// Bus topic carrying ranger readings (metres, `f64`).
pub const DISTANCE_TOPIC: &str = "distance";
