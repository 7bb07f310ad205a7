//! Cooperative cancellation for every blocking wait in the crate.
//!
//! A [`CancelToken`] is a cloneable, one-way latch.  Threads park on it
//! with [`CancelToken::wait_timeout`] (timer-style waits such as the
//! scheduler drain), and futures race against [`CancelToken::cancelled`]
//! (channel waits such as edge correlation and bus backpressure).
//! Cancelling wakes both kinds of waiter at once.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_lite::future;

use crate::error::{Error, Result};

/// Shared cancellation latch.  Clones observe the same state.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    parked: Condvar,
}

/// Pending futures register one waker each under a slot id and release
/// the slot when dropped, so the list only holds live waiters.
#[derive(Default)]
struct State {
    cancelled: bool,
    next_slot: u64,
    wakers: Vec<(u64, Waker)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the token and wake every parked thread and pending future.
    /// Idempotent.
    pub fn cancel(&self) {
        let wakers = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            core::mem::take(&mut state.wakers)
        };
        self.inner.parked.notify_all();
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Future that resolves once the token is cancelled.
    pub fn cancelled(&self) -> WaitCancelled<'_> {
        WaitCancelled {
            token: self,
            slot: None,
        }
    }

    /// Park the calling thread for at most `timeout`.
    /// Returns `true` if the token was (or became) cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .inner
            .parked
            .wait_timeout_while(state, timeout, |s| !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        state.cancelled
    }

    /// Drive `fut` to completion on the calling thread unless the token
    /// is cancelled first.  Completion wins when both are ready.
    pub fn block_on<F: Future>(&self, fut: F) -> Result<F::Output> {
        future::block_on(future::or(async { Ok(fut.await) }, async {
            self.cancelled().await;
            Err(Error::Cancelled)
        }))
    }

    #[cfg(test)]
    pub(crate) fn registered_wakers(&self) -> usize {
        self.lock().wakers.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Returned by [`CancelToken::cancelled`].
pub struct WaitCancelled<'a> {
    token: &'a CancelToken,
    slot: Option<u64>,
}

impl Future for WaitCancelled<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut state = this.token.lock();
        if state.cancelled {
            return Poll::Ready(());
        }
        let registered = this
            .slot
            .and_then(|id| state.wakers.iter().position(|(slot, _)| *slot == id));
        match registered {
            Some(index) => {
                let waker = &mut state.wakers[index].1;
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => {
                let id = state.next_slot;
                state.next_slot += 1;
                state.wakers.push((id, cx.waker().clone()));
                this.slot = Some(id);
            }
        }
        Poll::Pending
    }
}

impl Drop for WaitCancelled<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.slot.take() {
            self.token.lock().wakers.retain(|(slot, _)| *slot != id);
        }
    }
}
