//! Pipeline service: ranger → bus → reactive subscribers.
//!
//! ```text
//!  sampler thread                 bus dispatch            handler tasks
//!  ┌──────────────┐  publish   ┌──────────────┐   ┌──▶ indicator ──▶ ActuatorPort
//!  │ sample_once  │ ─────────▶ │  EventBus<f64>│ ──┤
//!  │ every N ms   │            └──────────────┘   └──▶ tone ───────▶ TonePort
//!  └──────────────┘
//! ```
//!
//! The command scheduler runs beside the pipeline and may share its
//! actuator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::bus::{Event, EventBus};
use crate::cancel::CancelToken;
use crate::config::{RuleConfig, SystemConfig};
use crate::drivers::task::{TaskRole, spawn_named};
use crate::error::{BusError, Error, Result};
use crate::sensors::DISTANCE_TOPIC;
use crate::sensors::ultrasonic::TimeOfFlightRanger;

use super::ports::{ActuatorPort, TonePort};
use super::rules::{indicator_for, tone_for};

// ───────────────────────────────────────────────────────────────
// Reactive subscribers
// ───────────────────────────────────────────────────────────────

/// Subscribe the indicator and tone rules to `bus`.  Events on other
/// topics are ignored.
pub fn register_reactive_handlers<I, T, const N: usize>(
    bus: &EventBus<f64, N>,
    indicator: Arc<I>,
    tone: Arc<T>,
    rules: &RuleConfig,
) where
    I: ActuatorPort + ?Sized + 'static,
    T: TonePort + ?Sized + 'static,
{
    let indicator_rules = rules.clone();
    bus.subscribe(move |ev: &Event<f64>| {
        if ev.topic() != DISTANCE_TOPIC {
            return Ok(());
        }
        let color = indicator_for(*ev.payload(), &indicator_rules);
        indicator.apply(&color.target())
    });

    let tone_rules = rules.clone();
    bus.subscribe(move |ev: &Event<f64>| {
        if ev.topic() != DISTANCE_TOPIC {
            return Ok(());
        }
        tone.set_tone(tone_for(*ev.payload(), &tone_rules))
    });
}

// ───────────────────────────────────────────────────────────────
// Pipeline
// ───────────────────────────────────────────────────────────────

/// Owns the bus and the sampling thread.
pub struct Pipeline {
    bus: Arc<EventBus<f64>>,
    cancel: CancelToken,
    sampler: Option<JoinHandle<()>>,
    readings: Arc<AtomicU64>,
}

impl Pipeline {
    /// Build the bus, wire the reactive subscribers and start sampling
    /// every `config.sample_interval_ms`.
    pub fn start<P, D, I, T>(
        ranger: TimeOfFlightRanger<P, D>,
        indicator: Arc<I>,
        tone: Arc<T>,
        config: &SystemConfig,
    ) -> Result<Self>
    where
        P: OutputPin + Send + 'static,
        D: DelayNs + Send + 'static,
        I: ActuatorPort + ?Sized + 'static,
        T: TonePort + ?Sized + 'static,
    {
        let bus = Arc::new(EventBus::new()?);
        register_reactive_handlers(&*bus, indicator, tone, &config.rules);

        let cancel = CancelToken::new();
        let readings = Arc::new(AtomicU64::new(0));
        let interval = config.sample_interval();
        let sampler = {
            let bus = Arc::clone(&bus);
            let cancel = cancel.clone();
            let readings = Arc::clone(&readings);
            spawn_named(TaskRole::Sampler, "ranger".into(), move || {
                sampling_loop(ranger, &bus, &cancel, &readings, interval);
            })?
        };
        info!(
            "pipeline: started ({} subscribers, every {}ms)",
            bus.subscriber_count(),
            interval.as_millis()
        );

        Ok(Self {
            bus,
            cancel,
            sampler: Some(sampler),
            readings,
        })
    }

    pub fn bus(&self) -> &EventBus<f64> {
        &self.bus
    }

    /// Readings published so far.
    pub fn readings(&self) -> u64 {
        self.readings.load(Ordering::Relaxed)
    }

    /// Stop sampling, then stop the bus.  Idempotent.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.sampler.take() {
            if handle.join().is_err() {
                warn!("pipeline: sampler thread panicked");
            }
            info!("pipeline: stopped after {} reading(s)", self.readings());
        }
        self.bus.shutdown();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sampling_loop<P, D>(
    mut ranger: TimeOfFlightRanger<P, D>,
    bus: &EventBus<f64>,
    cancel: &CancelToken,
    readings: &AtomicU64,
    interval: Duration,
) where
    P: OutputPin,
    D: DelayNs,
{
    loop {
        match ranger.sample_once(cancel) {
            Ok(distance) => match bus.publish_until(Event::new(DISTANCE_TOPIC, distance), cancel) {
                Ok(()) => {
                    readings.fetch_add(1, Ordering::Relaxed);
                    debug!("pipeline: distance {:.3} m", distance);
                }
                Err(Error::Cancelled | Error::Bus(BusError::Stopped)) => break,
                Err(e) => warn!("pipeline: publish failed: {}", e),
            },
            Err(Error::Cancelled) => break,
            // A bad sample never stops the loop; the next tick retries.
            Err(e) => warn!("pipeline: sample failed: {}", e),
        }
        if cancel.wait_timeout(interval) {
            break;
        }
    }
    debug!("pipeline: sampling loop exited");
}
