//! HC-SR04-style ultrasonic time-of-flight ranger.
//!
//! One measurement cycle:
//!
//! ```text
//!   Idle ──▶ Pulse ──▶ AwaitPulseEdge ──▶ AwaitEchoEdge ──▶ Compute ──▶ Idle
//!   trig=0   trig=1     first edge          second edge      (t2-t1)/1e9
//!            ≥10 µs     "pulse emitted"     "echo received"  × c / 2
//!            trig=0
//! ```
//!
//! The echo pin's interrupt handler timestamps each edge and pushes it
//! through an [`EdgeFeed`]; the ranger consumes exactly two edges per
//! cycle from the matching [`EdgeStream`].  The stream (capacity 2) is
//! created once and reused for every cycle.  The ranger has no timer of
//! its own; cadence comes from the caller.
//!
//! By default the two edges are taken at face value.  With
//! `harden_pairing` set, edges left over from an earlier aborted cycle are
//! discarded before the pulse and a pair whose echo does not follow the
//! pulse is rejected with [`SensorError::EdgeOrder`].

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::SystemConfig;
use crate::error::{HardwareError, Result, SensorError};

/// Edge channel depth: one pulse edge plus one echo edge.
pub const EDGE_DEPTH: usize = 2;

/// Minimum trigger hold time accepted by the sensor.
pub const MIN_PULSE_US: u32 = 10;

/// Speed of sound in dry air at ~20 °C.
pub const SPEED_OF_SOUND_M_PER_S: f64 = 343.0;

type EdgeChannel = Channel<CriticalSectionRawMutex, Edge, EDGE_DEPTH>;

/// One interrupt observation on the echo pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub pin: i32,
    pub timestamp_ns: u64,
    /// Pin level after the transition.
    pub high: bool,
}

/// Consumer side of the echo edge channel.  Owned by the ranger.
pub struct EdgeStream {
    chan: Arc<EdgeChannel>,
}

impl EdgeStream {
    pub fn new() -> Self {
        Self {
            chan: Arc::new(Channel::new()),
        }
    }

    /// A producer handle for the interrupt handler.
    pub fn feed(&self) -> EdgeFeed {
        EdgeFeed {
            chan: Arc::clone(&self.chan),
        }
    }

    /// Edges waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.chan.len()
    }

    fn recv(&self, cancel: &CancelToken) -> Result<Edge> {
        cancel.block_on(self.chan.receive())
    }

    fn drain_stale(&self) -> usize {
        let mut n = 0;
        while self.chan.try_receive().is_ok() {
            n += 1;
        }
        n
    }
}

impl Default for EdgeStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the echo edge channel.  Cheap to clone; never blocks.
#[derive(Clone)]
pub struct EdgeFeed {
    chan: Arc<EdgeChannel>,
}

impl EdgeFeed {
    /// Push an edge.  Returns `false` if the channel is full and the edge
    /// was dropped.  Safe to call from interrupt context.
    pub fn push(&self, edge: Edge) -> bool {
        self.chan.try_send(edge).is_ok()
    }
}

/// Where the ranger is within its current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingPhase {
    Idle,
    Pulse,
    AwaitPulseEdge,
    AwaitEchoEdge,
    Compute,
}

/// Tunables for one ranger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangerSettings {
    /// Trigger hold time in microseconds (≥ [`MIN_PULSE_US`]).
    pub pulse_us: u32,
    pub speed_of_sound_m_per_s: f64,
    /// Discard stale edges and check pulse/echo order.
    pub harden_pairing: bool,
}

impl RangerSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            pulse_us: config.trigger_pulse_us.max(MIN_PULSE_US),
            speed_of_sound_m_per_s: config.speed_of_sound_m_per_s,
            harden_pairing: config.harden_edge_pairing,
        }
    }
}

impl Default for RangerSettings {
    fn default() -> Self {
        Self {
            pulse_us: MIN_PULSE_US,
            speed_of_sound_m_per_s: SPEED_OF_SOUND_M_PER_S,
            harden_pairing: false,
        }
    }
}

/// Distance in metres from a pulse edge and an echo edge.
///
/// The round trip covers the distance twice, hence the halving.  A pair
/// in the wrong order yields a negative distance.
pub fn distance_from_edges(pulse_ns: u64, echo_ns: u64, speed_m_per_s: f64) -> f64 {
    let dt_ns = i128::from(echo_ns) - i128::from(pulse_ns);
    (dt_ns as f64 / 1e9) * speed_m_per_s / 2.0
}

/// Trigger-pin driver plus edge correlator.
pub struct TimeOfFlightRanger<P, D> {
    trigger: P,
    delay: D,
    edges: EdgeStream,
    settings: RangerSettings,
    phase: RangingPhase,
}

impl<P: OutputPin, D: DelayNs> TimeOfFlightRanger<P, D> {
    pub fn new(trigger: P, delay: D, edges: EdgeStream, settings: RangerSettings) -> Self {
        Self {
            trigger,
            delay,
            edges,
            settings,
            phase: RangingPhase::Idle,
        }
    }

    pub fn phase(&self) -> RangingPhase {
        self.phase
    }

    pub fn settings(&self) -> &RangerSettings {
        &self.settings
    }

    /// Run one full cycle and return the distance in metres.
    ///
    /// Pin failures abort the cycle with [`HardwareError::GpioWriteFailed`];
    /// `cancel` firing during either edge wait aborts with
    /// [`Error::Cancelled`](crate::error::Error::Cancelled).  Whatever the
    /// outcome, the ranger is back in [`RangingPhase::Idle`] afterwards.
    pub fn sample_once(&mut self, cancel: &CancelToken) -> Result<f64> {
        let result = self.cycle(cancel);
        self.phase = RangingPhase::Idle;
        result
    }

    fn cycle(&mut self, cancel: &CancelToken) -> Result<f64> {
        self.phase = RangingPhase::Idle;
        self.set_trigger(false)?;

        if self.settings.harden_pairing {
            let stale = self.edges.drain_stale();
            if stale > 0 {
                debug!("ranger: discarded {} stale edge(s)", stale);
            }
        }

        self.phase = RangingPhase::Pulse;
        self.set_trigger(true)?;
        self.delay.delay_us(self.settings.pulse_us);
        self.set_trigger(false)?;

        self.phase = RangingPhase::AwaitPulseEdge;
        let pulse = self.edges.recv(cancel)?;
        debug!("ranger: sound pulse was emitted (t={}ns)", pulse.timestamp_ns);

        self.phase = RangingPhase::AwaitEchoEdge;
        let echo = self.edges.recv(cancel)?;
        debug!("ranger: echo was received (t={}ns)", echo.timestamp_ns);

        self.phase = RangingPhase::Compute;
        if self.settings.harden_pairing && echo.timestamp_ns <= pulse.timestamp_ns {
            warn!(
                "ranger: echo edge {}ns does not follow pulse edge {}ns",
                echo.timestamp_ns, pulse.timestamp_ns
            );
            return Err(SensorError::EdgeOrder.into());
        }
        Ok(distance_from_edges(
            pulse.timestamp_ns,
            echo.timestamp_ns,
            self.settings.speed_of_sound_m_per_s,
        ))
    }

    fn set_trigger(&mut self, high: bool) -> Result<()> {
        let res = if high {
            self.trigger.set_high()
        } else {
            self.trigger.set_low()
        };
        res.map_err(|e| {
            warn!("ranger: trigger write failed: {:?}", e.kind());
            HardwareError::GpioWriteFailed.into()
        })
    }
}
