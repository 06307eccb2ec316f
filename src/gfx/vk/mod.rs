//! Vulkan device wrapper and per-frame recyclable resources (components L, N, O).

pub mod command_allocator;
pub mod destroy_queue;
pub mod device;
pub mod frame_context;
pub mod mesh_streamer;
pub mod tick_source;
pub mod transient_buffer_allocator;

pub use command_allocator::CommandAllocator;
pub use device::{Device, Queue, SubmitInfo};
pub use frame_context::{FrameContext, FrameContextRing};
pub use mesh_streamer::MeshStreamer;
pub use tick_source::TickSource;
pub use transient_buffer_allocator::{BufferKind, Pool as TransientBufferPool};
