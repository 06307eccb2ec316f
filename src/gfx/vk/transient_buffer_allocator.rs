//! Transient per-frame buffer allocator, grounded on spec §4.N and
//! `original_source/include/voxen/gfx/vk/vk_transient_buffer_allocator.hpp`.
//!
//! Two buffer kinds (`Scratch`: device-local, `Upload`: host-visible +
//! coherent + persistently mapped) are each bump-allocated top-down within
//! a backing `VkBuffer`; exhaustion retires the buffer to a *used* list and
//! creates a new, appropriately-sized one. Buffers idle past
//! `STALE_BUFFER_AGE_THRESHOLD` ticks are destroyed.

const MIN_BUFFER_SIZE: u64 = 1024 * 1024;
const MAX_BUFFER_SIZE: u64 = 64 * 1024 * 1024;
const STALE_BUFFER_AGE_THRESHOLD: u32 = 30;
/// Weight given to the newest tick's byte count in the running average.
const EXP_AVERAGE_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Scratch,
    Upload,
}

struct Buffer {
    size: u64,
    top: u64,
    last_allocation_tick: u64,
    idle_ticks: u32,
}

impl Buffer {
    fn new(size: u64) -> Self {
        Self { size, top: 0, last_allocation_tick: 0, idle_ticks: 0 }
    }

    fn remaining(&self) -> u64 {
        self.size - self.top
    }
}

/// Sizing + lifecycle bookkeeping for one buffer kind's pool of backing
/// buffers. Actual `VkBuffer` creation/destruction is left to the caller
/// (via [`Pool::take_destroyed`]/the returned sizes) so this stays unit
/// testable without a real device.
pub struct Pool {
    kind: BufferKind,
    active: Option<Buffer>,
    used: Vec<Buffer>,
    free: Vec<Buffer>,
    exp_average_bytes: f64,
    tick: u64,
}

pub struct Allocation {
    pub offset: u64,
}

impl Pool {
    pub fn new(kind: BufferKind) -> Self {
        Self { kind, active: None, used: Vec::new(), free: Vec::new(), exp_average_bytes: MIN_BUFFER_SIZE as f64, tick: 0 }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Reserves `size` bytes aligned to `alignment`. Returns `None` when a
    /// brand-new backing buffer must be created first (the caller should
    /// then call [`Pool::grow`] with the size [`Pool::next_buffer_size`]
    /// reports, then retry).
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<Allocation> {
        let buffer = self.active.as_mut()?;
        let aligned_top = align_up(buffer.top, alignment);
        if aligned_top + size > buffer.size {
            return None;
        }
        buffer.top = aligned_top + size;
        buffer.last_allocation_tick = self.tick;
        self.exp_average_bytes = self.exp_average_bytes * (1.0 - EXP_AVERAGE_ALPHA) + size as f64 * EXP_AVERAGE_ALPHA;
        Some(Allocation { offset: aligned_top })
    }

    /// Size a freshly created backing buffer should be, given `min_size`
    /// (the requested allocation that didn't fit).
    pub fn next_buffer_size(&self, min_size: u64) -> u64 {
        min_size.max(self.exp_average_bytes.clamp(MIN_BUFFER_SIZE as f64, MAX_BUFFER_SIZE as f64) as u64).next_multiple_of(MIN_BUFFER_SIZE)
    }

    /// Installs a freshly created backing buffer of `size` bytes as the
    /// active one, retiring the previous active buffer to *used*.
    pub fn grow(&mut self, size: u64) {
        if let Some(old) = self.active.take() {
            self.used.push(old);
        }
        self.active = Some(Buffer::new(size));
    }

    /// Tick-begin: retires *used* buffers whose last allocation has been
    /// completed back to *free* (reset to empty), and destroys *free*
    /// buffers that have sat idle too long. Returns the number of buffers
    /// actually destroyed this tick (the caller destroys the matching
    /// `VkBuffer` handles out-of-band).
    pub fn begin_tick(&mut self, completed_tick: u64) -> usize {
        self.tick += 1;
        let mut still_used = Vec::with_capacity(self.used.len());
        for mut buffer in self.used.drain(..) {
            if buffer.last_allocation_tick <= completed_tick {
                buffer.top = 0;
                buffer.idle_ticks = 0;
                self.free.push(buffer);
            } else {
                still_used.push(buffer);
            }
        }
        self.used = still_used;

        let mut destroyed = 0;
        self.free.retain_mut(|buffer| {
            buffer.idle_ticks += 1;
            if buffer.idle_ticks > STALE_BUFFER_AGE_THRESHOLD {
                destroyed += 1;
                false
            } else {
                true
            }
        });
        destroyed
    }

    pub fn remaining_in_active(&self) -> u64 {
        self.active.as_ref().map_or(0, Buffer::remaining)
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        value
    } else {
        (value + alignment - 1) & !(alignment - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_fails_until_a_buffer_is_grown() {
        let mut pool = Pool::new(BufferKind::Upload);
        assert!(pool.allocate(64, 16).is_none());
        pool.grow(pool.next_buffer_size(64));
        assert!(pool.allocate(64, 16).is_some());
    }

    #[test]
    fn allocations_bump_top_down_with_alignment() {
        let mut pool = Pool::new(BufferKind::Scratch);
        pool.grow(1024);
        let a = pool.allocate(10, 16).unwrap();
        let b = pool.allocate(10, 16).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 16);
    }

    #[test]
    fn exhausted_buffer_returns_none_until_grown_again() {
        let mut pool = Pool::new(BufferKind::Scratch);
        pool.grow(32);
        assert!(pool.allocate(20, 1).is_some());
        assert!(pool.allocate(20, 1).is_none());
        pool.grow(pool.next_buffer_size(20));
        assert!(pool.allocate(20, 1).is_some());
    }

    #[test]
    fn stale_free_buffers_are_destroyed() {
        let mut pool = Pool::new(BufferKind::Upload);
        pool.grow(1024);
        pool.allocate(10, 1).unwrap();
        pool.grow(1024); // retires the first buffer to `used`

        pool.begin_tick(u64::MAX); // moves it to `free`
        let mut destroyed_total = 0;
        for _ in 0..STALE_BUFFER_AGE_THRESHOLD + 1 {
            destroyed_total += pool.begin_tick(u64::MAX);
        }
        assert_eq!(destroyed_total, 1);
    }
}
