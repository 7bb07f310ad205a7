//! Topic-less publish/subscribe bus with fire-and-forget dispatch.
//!
//! ```text
//!   publish ──▶ [bounded queue, N] ──▶ dispatch loop ──┬──▶ handler task 1
//!                                                      ├──▶ handler task 2
//!                                                      └──▶ handler task k
//! ```
//!
//! Publishers block while the queue is full.  A single dispatch thread
//! drains it in publish order and starts one short-lived task per handler
//! per event, so a failing, panicking or slow handler never holds up the
//! others or the loop itself.
//!
//! Every publish is stamped with a sequence number and every subscription
//! remembers the first sequence number it is entitled to.  That gives the
//! delivery guarantee: a handler registered before a publish started sees
//! the event, a handler registered after the publish finished does not.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future;
use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::drivers::task::{TaskRole, spawn_named};
use crate::error::{BusError, Error, Result};

/// Default queue depth.
pub const BUS_DEPTH: usize = 10;

// ── Event ────────────────────────────────────────────────────

/// One published observation.  Immutable once published.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    topic: &'static str,
    payload: T,
}

impl<T> Event<T> {
    pub fn new(topic: &'static str, payload: T) -> Self {
        Self { topic, payload }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// A registered reaction to every event on the bus.
pub type Handler<T> = Arc<dyn Fn(&Event<T>) -> Result<()> + Send + Sync>;

/// Tagged result of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completed,
    Failed(Error),
    Panicked,
}

/// Run `handler` against `event`, converting an error or a panic into a
/// [`HandlerOutcome`] instead of letting it escape.
pub fn run_isolated<T>(handler: &Handler<T>, event: &Event<T>) -> HandlerOutcome {
    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => HandlerOutcome::Completed,
        Ok(Err(e)) => HandlerOutcome::Failed(e),
        Err(_) => HandlerOutcome::Panicked,
    }
}

struct Envelope<T> {
    seq: u64,
    event: Event<T>,
}

struct Subscription<T> {
    first_seq: u64,
    handler: Handler<T>,
}

struct BusShared<T, const N: usize> {
    queue: Channel<CriticalSectionRawMutex, Envelope<T>, N>,
    subscribers: Mutex<Vec<Subscription<T>>>,
    /// Next sequence number to hand out.
    published: AtomicU64,
    failures: AtomicU64,
}

impl<T, const N: usize> BusShared<T, N> {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscription<T>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── EventBus ─────────────────────────────────────────────────

/// Bounded publish/subscribe bus.  `N` is the queue depth.
pub struct EventBus<T, const N: usize = BUS_DEPTH>
where
    T: Send + Sync + 'static,
{
    shared: Arc<BusShared<T, N>>,
    cancel: CancelToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<T, const N: usize> EventBus<T, N>
where
    T: Send + Sync + 'static,
{
    /// Create the bus and start its dispatch loop.
    pub fn new() -> Result<Self> {
        let bus = Self::idle();
        bus.start()?;
        Ok(bus)
    }

    /// A bus whose dispatch loop has not been started yet.
    fn idle() -> Self {
        Self {
            shared: Arc::new(BusShared {
                queue: Channel::new(),
                subscribers: Mutex::new(Vec::new()),
                published: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
            cancel: CancelToken::new(),
            dispatcher: Mutex::new(None),
        }
    }

    fn start(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let handle = spawn_named(TaskRole::Dispatch, "bus-dispatch".into(), move || {
            dispatch_loop(&shared, &cancel);
        })?;
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("bus: dispatch loop started (depth={})", N);
        Ok(())
    }

    /// Enqueue `event`, blocking while the queue is full.
    pub fn publish(&self, event: Event<T>) -> Result<()> {
        self.send(event, None)
    }

    /// Like [`publish`](Self::publish), but gives up with
    /// [`Error::Cancelled`] if `cancel` fires while waiting for room.
    pub fn publish_until(&self, event: Event<T>, cancel: &CancelToken) -> Result<()> {
        self.send(event, Some(cancel))
    }

    /// Enqueue without waiting.  Fails with [`BusError::Full`] when there is
    /// no room.
    pub fn try_publish(&self, event: Event<T>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BusError::Stopped.into());
        }
        let seq = self.shared.published.fetch_add(1, Ordering::SeqCst);
        self.shared
            .queue
            .try_send(Envelope { seq, event })
            .map_err(|_| Error::Bus(BusError::Full))
    }

    fn send(&self, event: Event<T>, caller: Option<&CancelToken>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BusError::Stopped.into());
        }
        let seq = self.shared.published.fetch_add(1, Ordering::SeqCst);
        let sent = async {
            self.shared.queue.send(Envelope { seq, event }).await;
            Ok(())
        };
        let stopped = async {
            self.cancel.cancelled().await;
            Err(Error::Bus(BusError::Stopped))
        };
        let given_up = async {
            match caller {
                Some(token) => token.cancelled().await,
                None => future::pending::<()>().await,
            }
            Err(Error::Cancelled)
        };
        // Stop and cancel win over a send that became possible at the same
        // time: nothing enters the queue after shutdown drained it.
        future::block_on(future::or(stopped, future::or(given_up, sent)))
    }

    /// Register `handler` for every event published from now on.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&Event<T>) -> Result<()> + Send + Sync + 'static,
    {
        let mut subs = self.shared.subscribers();
        let first_seq = self.shared.published.load(Ordering::SeqCst);
        subs.push(Subscription {
            first_seq,
            handler: Arc::new(handler),
        });
        debug!("bus: subscriber #{} registered from seq {}", subs.len(), first_seq);
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers().len()
    }

    /// Events queued but not yet taken by the dispatch loop.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Handler invocations that returned an error or panicked.
    pub fn handler_failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Stop the dispatch loop and discard whatever is still queued.
    /// Handler tasks already running finish on their own.  Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("bus: dispatch loop panicked");
            }
        }
        let mut discarded = 0usize;
        while self.shared.queue.try_receive().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            info!("bus: shutdown discarded {} queued event(s)", discarded);
        }
    }
}

impl<T, const N: usize> Drop for EventBus<T, N>
where
    T: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Dispatch ─────────────────────────────────────────────────

fn dispatch_loop<T, const N: usize>(shared: &Arc<BusShared<T, N>>, cancel: &CancelToken)
where
    T: Send + Sync + 'static,
{
    while !cancel.is_cancelled() {
        match cancel.block_on(shared.queue.receive()) {
            Ok(envelope) => dispatch(shared, envelope),
            Err(_) => break,
        }
    }
    debug!("bus: dispatch loop exited");
}

fn dispatch<T, const N: usize>(shared: &Arc<BusShared<T, N>>, envelope: Envelope<T>)
where
    T: Send + Sync + 'static,
{
    let handlers: Vec<Handler<T>> = shared
        .subscribers()
        .iter()
        .filter(|s| s.first_seq <= envelope.seq)
        .map(|s| Arc::clone(&s.handler))
        .collect();

    if handlers.is_empty() {
        debug!("bus: event #{} had no subscribers", envelope.seq);
        return;
    }

    let seq = envelope.seq;
    let event = Arc::new(envelope.event);
    for (idx, handler) in handlers.into_iter().enumerate() {
        let task_shared = Arc::clone(shared);
        let task_event = Arc::clone(&event);
        let task_handler = Arc::clone(&handler);
        let spawned = spawn_named(TaskRole::Handler, format!("bus-h{idx}"), move || {
            let outcome = run_isolated(&task_handler, &task_event);
            record(&task_shared, seq, idx, outcome);
        });
        if spawned.is_err() {
            warn!("bus: handler {} for event #{} running inline", idx, seq);
            let outcome = run_isolated(&handler, &event);
            record(shared, seq, idx, outcome);
        }
    }
}

fn record<T, const N: usize>(shared: &BusShared<T, N>, seq: u64, idx: usize, outcome: HandlerOutcome) {
    match outcome {
        HandlerOutcome::Completed => {}
        HandlerOutcome::Failed(e) => {
            shared.failures.fetch_add(1, Ordering::Relaxed);
            warn!("bus: handler {} failed on event #{}: {}", idx, seq, e);
        }
        HandlerOutcome::Panicked => {
            shared.failures.fetch_add(1, Ordering::Relaxed);
            warn!("bus: handler {} panicked on event #{}", idx, seq);
        }
    }
}
