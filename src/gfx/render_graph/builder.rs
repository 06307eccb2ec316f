//! Render graph build phase, grounded on spec §4.M and
//! `original_source/include/voxen/gfx/render_graph_builder.hpp`.
//!
//! A user's `rebuild(builder)` callback declares images, buffers, views,
//! and passes; declaration order is execution order. The builder only
//! lives for the duration of one `rebuild` call - the graph it produces
//! (handles + pass list) is what actually persists across frames.

use super::resource::*;
use ash::vk;
use std::sync::Arc;

pub type ComputeCallback = Arc<dyn Fn(vk::CommandBuffer) + Send + Sync>;
pub type RenderCallback = Arc<dyn Fn(vk::CommandBuffer) + Send + Sync>;

pub enum PassKind {
    Compute { callback: ComputeCallback },
    Render { callback: RenderCallback, color_targets: Vec<RenderTarget>, depth_stencil: Option<DepthStencilTarget> },
}

pub struct Pass {
    pub name: String,
    pub kind: PassKind,
    pub usages: Vec<ResourceUsage>,
}

/// The declared shape of one frame's graph: every image/buffer/view the
/// user declared, plus the ordered pass list.
#[derive(Default)]
pub struct GraphDeclaration {
    pub images: Vec<ImageDesc>,
    pub buffers: Vec<BufferDesc>,
    pub views: Vec<(ResourceHandle, ViewDesc)>,
    pub passes: Vec<Pass>,
}

/// Passed to the user's `rebuild` callback. Accumulates declarations into
/// a [`GraphDeclaration`]; consumed once `rebuild` returns.
#[derive(Default)]
pub struct RenderGraphBuilder {
    declaration: GraphDeclaration,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_2d_image(&mut self, desc: ImageDesc) -> ImageHandle {
        self.declaration.images.push(desc);
        ImageHandle((self.declaration.images.len() - 1) as u32)
    }

    /// Declares a double-buffered image: two physical images whose
    /// `current`/`previous` roles swap at the start of each execution.
    pub fn make_double_buffered_2d_image(&mut self, desc: ImageDesc) -> DoubleBufferedImage {
        let a = self.make_2d_image(desc.clone());
        let b = self.make_2d_image(desc);
        DoubleBufferedImage { current: a, previous: b }
    }

    pub fn make_buffer(&mut self, desc: BufferDesc) -> BufferHandle {
        self.declaration.buffers.push(desc);
        BufferHandle((self.declaration.buffers.len() - 1) as u32)
    }

    pub fn make_view(&mut self, resource: ResourceHandle, desc: ViewDesc) -> ViewHandle {
        self.declaration.views.push((resource, desc));
        ViewHandle((self.declaration.views.len() - 1) as u32)
    }

    pub fn make_compute_pass(&mut self, name: impl Into<String>, callback: ComputeCallback, usages: Vec<ResourceUsage>) {
        self.declaration.passes.push(Pass { name: name.into(), kind: PassKind::Compute { callback }, usages });
    }

    pub fn make_render_pass(
        &mut self,
        name: impl Into<String>,
        callback: RenderCallback,
        color_targets: Vec<RenderTarget>,
        depth_stencil: Option<DepthStencilTarget>,
        usages: Vec<ResourceUsage>,
    ) {
        self.declaration.passes.push(Pass { name: name.into(), kind: PassKind::Render { callback, color_targets, depth_stencil }, usages });
    }

    pub fn finish(self) -> GraphDeclaration {
        self.declaration
    }
}

/// User-implemented graph definition. `rebuild` is called once per frame
/// (the graph must tolerate being rebuilt every frame).
pub trait RenderGraph {
    fn rebuild(&mut self, builder: &mut RenderGraphBuilder);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_matches_pass_order() {
        let mut builder = RenderGraphBuilder::new();
        builder.make_compute_pass("a", Arc::new(|_| {}), vec![]);
        builder.make_compute_pass("b", Arc::new(|_| {}), vec![]);
        let declaration = builder.finish();
        assert_eq!(declaration.passes[0].name, "a");
        assert_eq!(declaration.passes[1].name, "b");
    }

    #[test]
    fn double_buffered_image_yields_two_distinct_handles() {
        let mut builder = RenderGraphBuilder::new();
        let desc = ImageDesc { format: vk::Format::R8G8B8A8_UNORM, resolution: (1920, 1080), mips: 1, layers: 1 };
        let pair = builder.make_double_buffered_2d_image(desc);
        assert_ne!(pair.current, pair.previous);
    }
}
