//! Async counter tracker: a monotonic completion counter used to let
//! readers check "has everything submitted before tick N finished" without
//! waiting on every individual task, grounded on
//! `original_source/include/voxen/common/async_counter_tracker.hpp`.
//!
//! Each call to [`AsyncCounterTracker::begin`] reserves the next counter
//! value and returns a [`CompletionToken`]; the token's `complete` must be
//! called exactly once. `completed_through` reports the largest counter `N`
//! such that every token `<= N` has completed, which only advances in order
//! - a token completing out of order is held back in a pending list until
//! the gap in front of it closes. [`AsyncCounterTracker::wait_async`] lets a
//! task body (or [`super::task_builder::TaskBuilder`]) suspend on a counter
//! directly, the `co_await ctx.waitTaskCounter(c)` primitive from spec §4.D.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

struct Inner {
    next: AtomicU64,
    completed_through: AtomicU64,
    pending: Mutex<BinaryHeap<Reverse<u64>>>,
    wakers: Mutex<BTreeMap<u64, Vec<Waker>>>,
}

/// Shared handle to the tracker's counters.
#[derive(Clone)]
pub struct AsyncCounterTracker {
    inner: Arc<Inner>,
}

impl Default for AsyncCounterTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncCounterTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next: AtomicU64::new(1),
                completed_through: AtomicU64::new(0),
                pending: Mutex::new(BinaryHeap::new()),
                wakers: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Reserves the next sequence number. The returned token must later be
    /// completed exactly once (enforced in debug builds).
    pub fn begin(&self) -> CompletionToken {
        let value = self.inner.next.fetch_add(1, Ordering::AcqRel);
        CompletionToken { tracker: self.clone(), value, completed: false }
    }

    /// Largest `N` such that every counter `<= N` has completed.
    pub fn completed_through(&self) -> u64 {
        self.inner.completed_through.load(Ordering::Acquire)
    }

    /// Suspends the calling task until `sequence` has completed.
    pub fn wait_async(&self, sequence: u64) -> Wait {
        Wait { tracker: self.clone(), sequence }
    }

    fn complete(&self, value: u64) {
        let mut pending = self.inner.pending.lock();
        let mut watermark = self.inner.completed_through.load(Ordering::Acquire);
        if value == watermark + 1 {
            watermark += 1;
            while let Some(&Reverse(top)) = pending.peek() {
                if top == watermark + 1 {
                    pending.pop();
                    watermark += 1;
                } else {
                    break;
                }
            }
            self.inner.completed_through.store(watermark, Ordering::Release);
            drop(pending);
            self.wake_through(watermark);
        } else {
            pending.push(Reverse(value));
        }
    }

    fn wake_through(&self, watermark: u64) {
        let mut wakers = self.inner.wakers.lock();
        let ready: Vec<u64> = wakers.range(..=watermark).map(|(seq, _)| *seq).collect();
        for seq in ready {
            if let Some(list) = wakers.remove(&seq) {
                for waker in list {
                    waker.wake();
                }
            }
        }
    }
}

/// Future returned by [`AsyncCounterTracker::wait_async`].
pub struct Wait {
    tracker: AsyncCounterTracker,
    sequence: u64,
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.tracker.completed_through() >= self.sequence {
            return Poll::Ready(());
        }
        let mut wakers = self.tracker.inner.wakers.lock();
        // Re-check under the lock: `complete` may have advanced the
        // watermark between the check above and taking this lock.
        if self.tracker.completed_through() >= self.sequence {
            return Poll::Ready(());
        }
        wakers.entry(self.sequence).or_default().push(cx.waker().clone());
        Poll::Pending
    }
}

/// A reserved, not-yet-completed sequence number.
pub struct CompletionToken {
    tracker: AsyncCounterTracker,
    value: u64,
    completed: bool,
}

impl CompletionToken {
    pub fn sequence(&self) -> u64 {
        self.value
    }

    pub fn complete(mut self) {
        self.completed = true;
        self.tracker.complete(self.value);
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        debug_assert!(self.completed, "async counter tracker: token {} dropped without completing", self.value);
        if !self.completed {
            // Release builds still need forward progress even if a caller
            // forgot to call `complete` explicitly.
            self.tracker.complete(self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_completion_advances_watermark_immediately() {
        let tracker = AsyncCounterTracker::new();
        let a = tracker.begin();
        let b = tracker.begin();
        assert_eq!(tracker.completed_through(), 0);
        a.complete();
        assert_eq!(tracker.completed_through(), 1);
        b.complete();
        assert_eq!(tracker.completed_through(), 2);
    }

    #[test]
    fn out_of_order_completion_waits_for_the_gap_to_close() {
        let tracker = AsyncCounterTracker::new();
        let a = tracker.begin();
        let b = tracker.begin();
        let c = tracker.begin();

        b.complete();
        assert_eq!(tracker.completed_through(), 0, "cannot advance past an incomplete earlier token");
        c.complete();
        assert_eq!(tracker.completed_through(), 0);
        a.complete();
        assert_eq!(tracker.completed_through(), 3, "closing the gap should flush all buffered completions");
    }

    fn noop_waker() -> Waker {
        fn clone(_: *const ()) -> std::task::RawWaker {
            raw()
        }
        fn no_op(_: *const ()) {}
        fn raw() -> std::task::RawWaker {
            static VTABLE: std::task::RawWakerVTable = std::task::RawWakerVTable::new(clone, no_op, no_op, no_op);
            std::task::RawWaker::new(std::ptr::null(), &VTABLE)
        }
        unsafe { Waker::from_raw(raw()) }
    }

    #[test]
    fn wait_async_is_pending_until_the_sequence_completes_then_resolves() {
        let tracker = AsyncCounterTracker::new();
        let token = tracker.begin();
        let sequence = token.sequence();

        let mut wait = tracker.wait_async(sequence);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert_eq!(Pin::new(&mut wait).poll(&mut cx), Poll::Pending);

        token.complete();

        assert_eq!(Pin::new(&mut wait).poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn wait_async_resolves_immediately_for_an_already_completed_sequence() {
        let tracker = AsyncCounterTracker::new();
        let token = tracker.begin();
        token.complete();

        let mut wait = tracker.wait_async(1);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(Pin::new(&mut wait).poll(&mut cx), Poll::Ready(()));
    }
}
