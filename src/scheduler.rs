//! Priority command scheduler.
//!
//! Callers submit `(target, priority)` commands at any time; a drain timer
//! applies exactly one command per tick, lowest priority value first.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   submit(label, prio) ─┐                                     │
//! │   submit(label, prio) ─┼──▶ valid_targets()? ──▶ ┌────────┐  │
//! │   submit(label, prio) ─┘      (no lock held)     │  heap  │  │
//! │                                                  │ (min)  │  │
//! │   drain tick (every period) ── lock ─ pop ─ unlock └───┬────┘  │
//! │                                                      │       │
//! │                                   apply(target) ◀────┘       │
//! │                                   (outside the lock)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The heap has exactly one mutex.  Every critical section is a scoped
//! guard around a push or a pop; actuator I/O never runs under it.

use core::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use heapless::binary_heap::{BinaryHeap, Min};
use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, Target};
use crate::cancel::CancelToken;
use crate::drivers::task::{TaskRole, spawn_named};
use crate::error::{Error, QueueError, Result};

/// Maximum number of pending commands (stack-allocated heap).
pub const QUEUE_CAPACITY: usize = 32;

/// Drain period used when the caller has no configuration.
pub const DEFAULT_DRAIN_PERIOD: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
//  Command items
// ═══════════════════════════════════════════════════════════════

/// One pending actuation request.
///
/// Ordered by `priority` ascending (lower = more urgent), then by
/// submission order.  `seq` is assigned by the queue, never by callers.
#[derive(Debug, Clone)]
pub struct CommandItem {
    pub target: Target,
    pub priority: i32,
    seq: u64,
}

impl CommandItem {
    /// Insertion sequence number within the owning queue.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for CommandItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CommandItem {}

impl PartialOrd for CommandItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CommandItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Queue
// ═══════════════════════════════════════════════════════════════

/// Fixed-capacity min-heap of [`CommandItem`]s.  Not synchronised on its
/// own; [`CommandScheduler`] wraps it in a mutex.
pub struct CommandQueue {
    heap: BinaryHeap<CommandItem, Min, QUEUE_CAPACITY>,
    next_seq: u64,
    closed: bool,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            closed: false,
        }
    }

    /// Insert a command.  Fails with [`QueueError::Full`] when every slot
    /// is taken and with [`QueueError::Closed`] after [`close`](Self::close);
    /// the queue is left unchanged either way.
    pub fn push(&mut self, target: Target, priority: i32) -> Result<()> {
        if self.closed {
            return Err(QueueError::Closed.into());
        }
        let item = CommandItem {
            target,
            priority,
            seq: self.next_seq,
        };
        self.heap.push(item).map_err(|_| QueueError::Full)?;
        self.next_seq += 1;
        Ok(())
    }

    /// Remove and return the most urgent command.
    pub fn pop(&mut self) -> Option<CommandItem> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&CommandItem> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Refuse further pushes and drop everything pending.  Returns the
    /// number of commands discarded.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let discarded = self.heap.len();
        self.heap.clear();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

struct SchedulerShared<A> {
    queue: Mutex<CommandQueue>,
    actuator: A,
}

impl<A: ActuatorPort> SchedulerShared<A> {
    fn queue(&self) -> MutexGuard<'_, CommandQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain_once(&self) -> Result<Option<CommandItem>> {
        // Scoped guard: released before the actuator is touched.
        let item = {
            let mut queue = self.queue();
            if queue.is_empty() {
                return Ok(None);
            }
            queue.pop()
        };
        let Some(item) = item else {
            return Ok(None);
        };

        match self.actuator.apply(&item.target) {
            Ok(()) => {
                info!(
                    "scheduler: applied '{}' (position={}, priority={})",
                    item.target.label, item.target.position, item.priority
                );
                Ok(Some(item))
            }
            Err(e) => {
                warn!("scheduler: applying '{}' failed: {}", item.target.label, e);
                Err(e)
            }
        }
    }
}

/// Priority-ordered command queue drained onto one shared actuator.
///
/// Construct with [`new`](Self::new), then either call
/// [`drain_once`](Self::drain_once) from your own timer or
/// [`start`](Self::start) the built-in drain thread.
pub struct CommandScheduler<A: ActuatorPort + 'static> {
    shared: Arc<SchedulerShared<A>>,
    cancel: CancelToken,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl<A: ActuatorPort + 'static> CommandScheduler<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                queue: Mutex::new(CommandQueue::new()),
                actuator,
            }),
            cancel: CancelToken::new(),
            drain: Mutex::new(None),
        }
    }

    /// Spawn the drain thread: every `period`, apply at most one command.
    /// Ticks run on a fixed cadence; a tick that overruns skips the ones it
    /// missed.  Calling it twice is a no-op.
    pub fn start(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(Error::Config("drain period must be non-zero"));
        }
        let mut slot = self.drain.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(QueueError::Closed.into());
        }
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        *slot = Some(spawn_named(TaskRole::Drain, "cmd-drain".into(), move || {
            let mut next = Instant::now() + period;
            while !cancel.wait_timeout(next.saturating_duration_since(Instant::now())) {
                // Failures were already logged; the next tick carries on.
                let _ = shared.drain_once();
                next += period;
                let now = Instant::now();
                while next <= now {
                    next += period;
                }
            }
            debug!("scheduler: drain loop exited");
        })?);
        info!("scheduler: drain started (period={}ms)", period.as_millis());
        Ok(())
    }

    /// Validate `label` against the actuator's current targets and queue it.
    ///
    /// Unknown labels fail with [`Error::InvalidTarget`] and leave the queue
    /// untouched.  After [`shutdown`](Self::shutdown) every submit fails
    /// with [`QueueError::Closed`].
    pub fn submit(&self, label: &str, priority: i32) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Closed.into());
        }
        let labels = self.shared.actuator.valid_targets()?;
        let Some(position) = labels.iter().position(|l| l == label) else {
            warn!("scheduler: rejected unknown target '{}' (valid: {:?})", label, labels);
            return Err(Error::InvalidTarget);
        };

        let pending = {
            let mut queue = self.shared.queue();
            queue.push(Target::new(position as u32, label), priority)?;
            queue.len()
        };
        debug!(
            "scheduler: queued '{}' priority={} (pending={})",
            label, priority, pending
        );
        Ok(())
    }

    /// Pop the most urgent command and apply it.  `Ok(None)` when idle.
    pub fn drain_once(&self) -> Result<Option<CommandItem>> {
        self.shared.drain_once()
    }

    /// Pending command count.
    pub fn len(&self) -> usize {
        self.shared.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue().is_empty()
    }

    pub fn actuator(&self) -> &A {
        &self.shared.actuator
    }

    /// Stop the drain thread and discard pending commands.  Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("scheduler: drain thread panicked");
            }
        }
        let discarded = self.shared.queue().close();
        if discarded > 0 {
            info!("scheduler: shutdown discarded {} pending command(s)", discarded);
        }
    }
}

impl<A: ActuatorPort + 'static> Drop for CommandScheduler<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
