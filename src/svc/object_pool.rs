//! Private and shared object pools, grounded on
//! `original_source/include/voxen/common/private_object_pool.hpp` and
//! `shared_object_pool.hpp`.
//!
//! Both pools hand out `Box`-like handles backed by a free list of slots so
//! repeated allocate/free cycles of same-sized objects avoid the global
//! allocator. `PrivateObjectPool` is `!Sync` (single owner, single thread);
//! `SharedObjectPool` wraps the same slot storage behind a `Mutex` so
//! multiple threads can allocate and free concurrently.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

struct Slot<T> {
    value: Option<T>,
}

/// A single-threaded pool of reusable `T` slots.
pub struct PrivateObjectPool<T> {
    slots: RefCell<Vec<Slot<T>>>,
    free: RefCell<Vec<usize>>,
}

impl<T> Default for PrivateObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrivateObjectPool<T> {
    pub fn new() -> Self {
        Self { slots: RefCell::new(Vec::new()), free: RefCell::new(Vec::new()) }
    }

    pub fn acquire(&self, value: T) -> PrivateHandle<'_, T> {
        let index = if let Some(idx) = self.free.borrow_mut().pop() {
            self.slots.borrow_mut()[idx].value = Some(value);
            idx
        } else {
            let mut slots = self.slots.borrow_mut();
            slots.push(Slot { value: Some(value) });
            slots.len() - 1
        };
        PrivateHandle { pool: self, index }
    }

    pub fn capacity(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn free_count(&self) -> usize {
        self.free.borrow().len()
    }

    fn release(&self, index: usize) {
        self.slots.borrow_mut()[index].value = None;
        self.free.borrow_mut().push(index);
    }
}

pub struct PrivateHandle<'a, T> {
    pool: &'a PrivateObjectPool<T>,
    index: usize,
}

// `RefCell::borrow()` can't outlive the call, so handing back a plain
// reference tied to `&self` needs a raw pointer: computed fresh on every
// call (never cached), so a later `Vec` reallocation from an unrelated
// `acquire` can't leave it dangling.
impl<T> PrivateHandle<'_, T> {
    fn slot_ptr(&self) -> *mut Option<T> {
        &mut self.pool.slots.borrow_mut()[self.index].value as *mut Option<T>
    }
}

impl<T> Deref for PrivateHandle<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { (*self.slot_ptr()).as_ref().expect("handle outlives its slot") }
    }
}

impl<T> DerefMut for PrivateHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { (*self.slot_ptr()).as_mut().expect("handle outlives its slot") }
    }
}

impl<T> Drop for PrivateHandle<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

/// Thread-safe counterpart of [`PrivateObjectPool`]. Handles can be sent
/// across threads and released from any thread.
pub struct SharedObjectPool<T> {
    inner: Arc<Mutex<SharedInner<T>>>,
}

struct SharedInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Clone for SharedObjectPool<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Default for SharedObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedObjectPool<T> {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(SharedInner { slots: Vec::new(), free: Vec::new() })) }
    }

    pub fn acquire(&self, value: T) -> SharedHandle<T> {
        let mut inner = self.inner.lock();
        let index = if let Some(idx) = inner.free.pop() {
            inner.slots[idx].value = Some(value);
            idx
        } else {
            inner.slots.push(Slot { value: Some(value) });
            inner.slots.len() - 1
        };
        SharedHandle { pool: self.inner.clone(), index }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }
}

pub struct SharedHandle<T> {
    pool: Arc<Mutex<SharedInner<T>>>,
    index: usize,
}

unsafe impl<T: Send> Send for SharedHandle<T> {}

impl<T> SharedHandle<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let inner = self.pool.lock();
        f(inner.slots[self.index].value.as_ref().expect("handle outlives its slot"))
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut inner = self.pool.lock();
        f(inner.slots[self.index].value.as_mut().expect("handle outlives its slot"))
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        let mut inner = self.pool.lock();
        inner.slots[self.index].value = None;
        inner.free.push(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_pool_reuses_freed_slots() {
        let pool: PrivateObjectPool<u32> = PrivateObjectPool::new();
        {
            let _a = pool.acquire(1);
            let _b = pool.acquire(2);
        }
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 2);
        let _c = pool.acquire(3);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn private_handle_reads_and_writes() {
        let pool: PrivateObjectPool<String> = PrivateObjectPool::new();
        let mut handle = pool.acquire(String::from("a"));
        handle.push('b');
        assert_eq!(&*handle, "ab");
    }

    #[test]
    fn shared_pool_works_across_threads() {
        let pool: SharedObjectPool<u64> = SharedObjectPool::new();
        let handle = pool.acquire(7);
        let pool2 = pool.clone();
        let joined = std::thread::spawn(move || {
            let h2 = pool2.acquire(8);
            h2.with(|v| *v)
        })
        .join()
        .unwrap();
        assert_eq!(joined, 8);
        assert_eq!(handle.with(|v| *v), 7);
    }
}
