//! Frame context ring: the per-frame command buffer + constant-upload pool
//! + descriptor allocator bundle, grounded on spec §4.N and
//! `original_source/include/voxen/gfx/vk/vk_frame_context.hpp`. Descriptor
//! set allocation uses `gpu-descriptor`/`gpu-descriptor-ash`, grounded on
//! `examples/cwfitzgerald-wgpu`'s Vulkan backend dependency set.

use super::device::{Device, Queue};
use super::transient_buffer_allocator::{BufferKind, Pool};
use ash::vk;
use gpu_descriptor::DescriptorAllocator;
use gpu_descriptor_ash::AshDescriptorDevice;

/// A reserved range of a `FrameContext`'s constant-upload buffer.
pub struct ConstantUpload {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub host_span: *mut u8,
    pub size: u64,
}

/// One slot of the frame context ring: a command buffer plus a persistent
/// constant-upload pool and temporary descriptor sets, all reset at
/// `submit_and_advance`.
pub struct FrameContext {
    command_buffer: vk::CommandBuffer,
    upload_buffer: vk::Buffer,
    upload_mapped: *mut u8,
    upload_pool: Pool,
    min_uniform_buffer_offset_alignment: u64,
    descriptor_allocator: DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>,
    last_submit_timeline: u64,
}

// SAFETY: `upload_mapped` points into host-coherent mapped memory owned by
// `upload_buffer`'s allocation, which outlives this struct; access is
// always through `&mut self`.
unsafe impl Send for FrameContext {}

impl FrameContext {
    pub fn new(command_buffer: vk::CommandBuffer, upload_buffer: vk::Buffer, upload_mapped: *mut u8, upload_buffer_size: u64, min_uniform_buffer_offset_alignment: u64) -> Self {
        let mut upload_pool = Pool::new(BufferKind::Upload);
        upload_pool.grow(upload_buffer_size);
        Self {
            command_buffer,
            upload_buffer,
            upload_mapped,
            upload_pool,
            min_uniform_buffer_offset_alignment,
            descriptor_allocator: DescriptorAllocator::new(0),
            last_submit_timeline: 0,
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Reserves `size` bytes of constant-upload space, aligned to
    /// `minUniformBufferOffsetAlignment`.
    pub fn allocate_constant_upload(&mut self, size: u64) -> Option<ConstantUpload> {
        let allocation = self.upload_pool.allocate(size, self.min_uniform_buffer_offset_alignment)?;
        Some(ConstantUpload { buffer: self.upload_buffer, offset: allocation.offset, host_span: unsafe { self.upload_mapped.add(allocation.offset as usize) }, size })
    }

    /// Ends recording, submits on `device`'s main queue, and returns the
    /// submitted timeline value. Call `reset` once that value is waited on
    /// before reusing this slot.
    pub fn submit_and_advance(&mut self, device: &Device, command_buffers: &[vk::CommandBuffer]) -> Result<u64, crate::util::error::GfxError> {
        unsafe { device.raw().end_command_buffer(self.command_buffer) }.map_err(|e| crate::util::error::GfxError::ExternalLibFailure(e.to_string()))?;
        let value = device.submit_commands(super::device::SubmitInfo {
            queue: Queue::Main,
            waits: &[],
            binary_wait: None,
            command_buffers,
            binary_signal: None,
            fence: None,
        })?;
        self.last_submit_timeline = value;
        Ok(value)
    }

    /// Waits for this slot's previous submission to complete, then resets
    /// its temporaries (upload pool top, descriptor sets) for reuse.
    pub fn reset(&mut self, device: &Device) -> Result<(), crate::util::error::GfxError> {
        device.wait_for_timeline(Queue::Main, self.last_submit_timeline)?;
        self.upload_pool.begin_tick(self.last_submit_timeline);
        unsafe { device.raw().reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty()) }
            .map_err(|e| crate::util::error::GfxError::ExternalLibFailure(e.to_string()))?;
        Ok(())
    }
}

/// A ring of `FrameContext`s. Ring size >= 2; 2-3 recommended.
pub struct FrameContextRing {
    contexts: Vec<FrameContext>,
    current: usize,
}

impl FrameContextRing {
    pub fn new(contexts: Vec<FrameContext>) -> Self {
        assert!(contexts.len() >= 2, "frame context ring size must be >= 2");
        Self { contexts, current: 0 }
    }

    pub fn current(&mut self) -> &mut FrameContext {
        &mut self.contexts[self.current]
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.contexts.len();
    }
}
