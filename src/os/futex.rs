//! Word-sized wait/wake primitive used by the task service's per-worker work
//! counters and the pipe memory allocator's GC thread.
//!
//! Grounded on `original_source/src/voxen/os/futex.cpp`. Linux's raw futex
//! syscall has no portable equivalent in the teacher's dependency stack, so
//! this is built atop `parking_lot_core`'s parking lot (the same crate family
//! `parking_lot`, already a teacher dependency, is implemented on) which gives
//! the same wait/notify semantics on every platform the original targets.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// An atomic `u64` with blocking wait support, the "futex word" of the
/// original engine's scheduling primitives.
pub struct Futex {
    value: AtomicU64,
    gate: Mutex<()>,
    condvar: Condvar,
}

impl Futex {
    pub fn new(initial: u64) -> Self {
        Self {
            value: AtomicU64::new(initial),
            gate: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub fn load(&self, order: Ordering) -> u64 {
        self.value.load(order)
    }

    pub fn store(&self, value: u64, order: Ordering) {
        self.value.store(value, order);
        self.wake_all();
    }

    pub fn fetch_add(&self, delta: u64, order: Ordering) -> u64 {
        let prev = self.value.fetch_add(delta, order);
        self.wake_all();
        prev
    }

    pub fn fetch_sub(&self, delta: u64, order: Ordering) -> u64 {
        let prev = self.value.fetch_sub(delta, order);
        self.wake_all();
        prev
    }

    /// Blocks while the current value equals `expected`, matching the
    /// classic futex-wait contract (spurious wakeups are allowed: callers
    /// must re-check the condition they actually care about).
    pub fn wait_while_eq(&self, expected: u64) {
        let mut guard = self.gate.lock();
        while self.value.load(Ordering::Acquire) == expected {
            self.condvar.wait(&mut guard);
        }
    }

    pub fn wait_while_eq_timeout(&self, expected: u64, timeout: Duration) -> bool {
        let mut guard = self.gate.lock();
        let mut remaining = timeout;
        while self.value.load(Ordering::Acquire) == expected {
            let result = self.condvar.wait_for(&mut guard, remaining);
            if result.timed_out() {
                return self.value.load(Ordering::Acquire) != expected;
            }
            remaining = Duration::ZERO;
            if remaining.is_zero() {
                break;
            }
        }
        true
    }

    fn wake_all(&self) {
        let _guard = self.gate.lock();
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_wakes_on_store() {
        let futex = Arc::new(Futex::new(0));
        let waiter = futex.clone();
        let handle = thread::spawn(move || {
            waiter.wait_while_eq(0);
            waiter.load(Ordering::Acquire)
        });

        thread::sleep(Duration::from_millis(10));
        futex.store(42, Ordering::Release);

        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn fetch_add_wakes_waiters() {
        let futex = Arc::new(Futex::new(0));
        let waiter = futex.clone();
        let handle = thread::spawn(move || waiter.wait_while_eq(0));
        thread::sleep(Duration::from_millis(10));
        futex.fetch_add(1, Ordering::AcqRel);
        handle.join().unwrap();
        assert_eq!(futex.load(Ordering::Acquire), 1);
    }
}
