//! Sonarbus library.
//!
//! Ultrasonic time-of-flight ranging, a bounded publish/subscribe bus with
//! reactive subscribers, and a priority command scheduler, all behind
//! `embedded-hal` traits so the same code drives real pins or the host
//! simulation in [`adapters::sim`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod cancel;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod scheduler;
pub mod sensors;

pub use error::{Error, Result};
