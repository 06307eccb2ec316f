//! Render graph resource declarations, grounded on spec §4.M and
//! `original_source/include/voxen/gfx/render_graph_builder.hpp`.

use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(super) u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(super) u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub(super) u32);

#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub format: vk::Format,
    pub resolution: (u32, u32),
    pub mips: u32,
    pub layers: u32,
}

/// A double-buffered image: two physical images whose `current`/`previous`
/// roles swap at the start of each graph execution.
#[derive(Debug, Clone, Copy)]
pub struct DoubleBufferedImage {
    pub current: ImageHandle,
    pub previous: ImageHandle,
}

#[derive(Debug, Clone, Copy)]
pub enum BufferSize {
    Fixed(u64),
    /// Size is set per execution via `RenderGraphExecution::set_dynamic_buffer_size`.
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub size: BufferSize,
    pub usage: vk::BufferUsageFlags,
}

#[derive(Debug, Clone, Copy)]
pub enum ViewDesc {
    WholeImage,
    SingleMip(u32),
    MipRange { base: u32, count: u32, reinterpret_format: Option<vk::Format> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Image(ImageHandle),
    Buffer(BufferHandle),
    View(ViewHandle),
}

/// One pass's declared usage of a resource: the access pattern the barrier
/// synthesis pass (see [`super::execution`]) reasons about.
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
    pub resource: ResourceHandle,
    pub stages: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
    pub layout: Option<vk::ImageLayout>,
    pub discard: bool,
}

#[derive(Clone, Copy)]
pub struct RenderTarget {
    pub view: ViewHandle,
    pub load_op: vk::AttachmentLoadOp,
    pub clear_value: vk::ClearValue,
}

#[derive(Clone, Copy)]
pub struct DepthStencilTarget {
    pub view: ViewHandle,
    pub load_op: vk::AttachmentLoadOp,
    pub clear_value: vk::ClearValue,
}
