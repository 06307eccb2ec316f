//! Render graph execution phase: barrier synthesis + pass dispatch,
//! grounded on spec §4.M. The accumulated-usage-since-last-touch barrier
//! rule is the same shape as a GPU resource tracker deciding read/write
//! hazards per resource before each command, generalized here from ash
//! calls the teacher issues directly in `src/render/vulkan.rs` into a
//! graph that reasons about the *declared* usage list instead of ad hoc
//! per-call synchronization.

use super::builder::{GraphDeclaration, PassKind};
use super::resource::{ResourceHandle, ResourceUsage};
use ash::vk;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct LastTouch {
    stages: vk::PipelineStageFlags,
    access: vk::AccessFlags,
    layout: Option<vk::ImageLayout>,
    is_write: bool,
}

fn is_write_access(access: vk::AccessFlags) -> bool {
    access.intersects(
        vk::AccessFlags::SHADER_WRITE
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            | vk::AccessFlags::TRANSFER_WRITE
            | vk::AccessFlags::HOST_WRITE
            | vk::AccessFlags::MEMORY_WRITE,
    )
}

/// One barrier the runner must emit before a pass executes.
#[derive(Debug, Clone, Copy)]
pub struct Barrier {
    pub resource: ResourceHandle,
    pub src_stages: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_stages: vk::PipelineStageFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: Option<vk::ImageLayout>,
    pub new_layout: Option<vk::ImageLayout>,
}

/// Tracks each resource's last recorded usage across a single graph
/// execution and decides whether a new usage needs a barrier:
/// read-after-write, write-after-write, write-after-read, or a layout
/// change always need one; read-after-read only expands the pipeline
/// stage mask of the prior barrierless state.
#[derive(Default)]
pub struct BarrierSynthesizer {
    last_touch: HashMap<ResourceHandle, LastTouch>,
}

impl BarrierSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per declared usage, in declaration order. Returns a
    /// barrier if one is required before this usage executes.
    pub fn touch(&mut self, usage: &ResourceUsage) -> Option<Barrier> {
        let write = is_write_access(usage.access);
        let entry = self.last_touch.get(&usage.resource).copied();

        let barrier = match entry {
            None => usage.layout.map(|layout| Barrier {
                resource: usage.resource,
                src_stages: vk::PipelineStageFlags::TOP_OF_PIPE,
                src_access: vk::AccessFlags::empty(),
                dst_stages: usage.stages,
                dst_access: usage.access,
                old_layout: Some(vk::ImageLayout::UNDEFINED),
                new_layout: Some(layout),
            }),
            Some(prev) => {
                let layout_changed = prev.layout != usage.layout && usage.layout.is_some();
                let needs_barrier = prev.is_write || write || layout_changed;
                if needs_barrier {
                    Some(Barrier {
                        resource: usage.resource,
                        src_stages: prev.stages,
                        src_access: prev.access,
                        dst_stages: usage.stages,
                        dst_access: usage.access,
                        old_layout: prev.layout,
                        new_layout: usage.layout.or(prev.layout),
                    })
                } else {
                    None
                }
            }
        };

        let merged_stages = entry.map_or(usage.stages, |prev| if !write && !prev.is_write { prev.stages | usage.stages } else { usage.stages });
        self.last_touch.insert(usage.resource, LastTouch { stages: merged_stages, access: usage.access, layout: usage.layout.or(entry.and_then(|e| e.layout)), is_write: write });

        barrier
    }
}

/// Runs one execution of a built graph: emits barriers ahead of each
/// pass's usages, then dispatches the pass callback wrapped in
/// `vkCmdBeginRendering`/`EndRendering` for render passes.
pub struct RenderGraphExecution<'a> {
    declaration: &'a GraphDeclaration,
    dynamic_buffer_sizes: HashMap<u32, u64>,
}

impl<'a> RenderGraphExecution<'a> {
    pub fn new(declaration: &'a GraphDeclaration) -> Self {
        Self { declaration, dynamic_buffer_sizes: HashMap::new() }
    }

    pub fn set_dynamic_buffer_size(&mut self, buffer_index: u32, size: u64) {
        self.dynamic_buffer_sizes.insert(buffer_index, size);
    }

    /// Returns, in pass order, the barriers that must be issued before
    /// each pass's body runs.
    pub fn synthesize_barriers(&self) -> Vec<Vec<Barrier>> {
        let mut synthesizer = BarrierSynthesizer::new();
        self.declaration.passes.iter().map(|pass| pass.usages.iter().filter_map(|usage| synthesizer.touch(usage)).collect()).collect()
    }

    /// Runs `record_barrier` then each pass's callback, in declaration
    /// order, on `command_buffer`. Render passes are expected to wrap the
    /// callback in `vkCmdBeginRendering`/`EndRendering`; that glue lives in
    /// `record_render_pass` since it needs render-target descriptions the
    /// callback itself doesn't have.
    pub fn run(&self, command_buffer: vk::CommandBuffer, mut record_barrier: impl FnMut(vk::CommandBuffer, &Barrier), mut begin_rendering: impl FnMut(vk::CommandBuffer, &super::builder::Pass), mut end_rendering: impl FnMut(vk::CommandBuffer)) {
        let barriers_per_pass = self.synthesize_barriers();
        for (pass, barriers) in self.declaration.passes.iter().zip(barriers_per_pass) {
            for barrier in &barriers {
                record_barrier(command_buffer, barrier);
            }
            match &pass.kind {
                PassKind::Compute { callback } => callback(command_buffer),
                PassKind::Render { callback, .. } => {
                    begin_rendering(command_buffer, pass);
                    callback(command_buffer);
                    end_rendering(command_buffer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::render_graph::resource::ImageHandle;

    fn usage(resource: ResourceHandle, access: vk::AccessFlags, layout: Option<vk::ImageLayout>) -> ResourceUsage {
        ResourceUsage { resource, stages: vk::PipelineStageFlags::ALL_COMMANDS, access, layout, discard: false }
    }

    #[test]
    fn first_touch_with_a_layout_requires_a_barrier() {
        let mut synthesizer = BarrierSynthesizer::new();
        let resource = ResourceHandle::Image(ImageHandle(0));
        let barrier = synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)));
        assert!(barrier.is_some());
    }

    #[test]
    fn consecutive_reads_need_no_barrier() {
        let mut synthesizer = BarrierSynthesizer::new();
        let resource = ResourceHandle::Image(ImageHandle(0));
        synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)));
        let second = synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)));
        assert!(second.is_none());
    }

    #[test]
    fn write_after_read_requires_a_barrier() {
        let mut synthesizer = BarrierSynthesizer::new();
        let resource = ResourceHandle::Image(ImageHandle(0));
        synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)));
        let write = synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_WRITE, Some(vk::ImageLayout::GENERAL)));
        assert!(write.is_some());
    }

    #[test]
    fn layout_change_requires_a_barrier_even_without_a_write() {
        let mut synthesizer = BarrierSynthesizer::new();
        let resource = ResourceHandle::Image(ImageHandle(0));
        synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)));
        let transitioned = synthesizer.touch(&usage(resource, vk::AccessFlags::SHADER_READ, Some(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)));
        assert!(transitioned.is_some());
    }
}
