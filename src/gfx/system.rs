//! Graphics subsystem entry point, grounded on
//! `original_source/include/voxen/gfx/gfx_system.hpp`. Owns every
//! Vulkan-facing component and threads the frame tick boundary through all
//! of them; not a service-locator entry itself (consumes engine state,
//! isn't looked up by name elsewhere), matching the original's "not a
//! service" note.

use std::sync::Arc;

use ash::vk;

use super::land_loader::LandLoader;
use super::render_graph::{Barrier, GraphDeclaration, Pass, RenderGraph, RenderGraphBuilder, RenderGraphExecution};
use super::vk::{CommandAllocator, Device, FrameContextRing, MeshStreamer, Queue, TickSource};
use crate::util::error::GfxError;

/// Ties the device, per-frame allocators, mesh streaming, land draw-list
/// building, and the render graph runner into the one object `drawFrame`
/// is called on each frame.
pub struct GfxSystem {
    device: Arc<Device>,
    command_allocator: CommandAllocator,
    frame_contexts: FrameContextRing,
    mesh_streamer: MeshStreamer,
    land_loader: LandLoader,
    tick_source: TickSource,
}

impl GfxSystem {
    pub fn new(device: Arc<Device>, command_allocator: CommandAllocator, frame_contexts: FrameContextRing) -> Self {
        Self { device, command_allocator, frame_contexts, mesh_streamer: MeshStreamer::new(), land_loader: LandLoader::new(), tick_source: TickSource::new() }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn command_allocator_mut(&mut self) -> &mut CommandAllocator {
        &mut self.command_allocator
    }

    pub fn mesh_streamer_mut(&mut self) -> &mut MeshStreamer {
        &mut self.mesh_streamer
    }

    pub fn land_loader_mut(&mut self) -> &mut LandLoader {
        &mut self.land_loader
    }

    pub fn current_tick(&self) -> u64 {
        self.tick_source.current()
    }

    /// Advances the frame tick, rebuilds `graph`'s declaration, and runs it
    /// on the current frame context's command buffer. `record_barrier` and
    /// the begin/end-rendering callbacks perform the actual `ash` calls;
    /// this method only decides what to record and in what order.
    pub fn draw_frame(
        &mut self,
        graph: &mut impl RenderGraph,
        record_barrier: impl FnMut(vk::CommandBuffer, &Barrier),
        begin_rendering: impl FnMut(vk::CommandBuffer, &Pass),
        end_rendering: impl FnMut(vk::CommandBuffer),
    ) -> Result<u64, GfxError> {
        let snapshot = self.tick_source.advance(&self.device);
        self.command_allocator.begin_tick(snapshot.completed_timelines).map_err(|e| GfxError::ExternalLibFailure(e.to_string()))?;
        self.mesh_streamer.begin_tick();
        self.land_loader.begin_tick();

        let mut builder = RenderGraphBuilder::new();
        graph.rebuild(&mut builder);
        let declaration: GraphDeclaration = builder.finish();

        let frame_context = self.frame_contexts.current();
        frame_context.reset(&self.device)?;
        let command_buffer = frame_context.command_buffer();

        let execution = RenderGraphExecution::new(&declaration);
        execution.run(command_buffer, record_barrier, begin_rendering, end_rendering);

        let submitted = frame_context.submit_and_advance(&self.device, &[command_buffer])?;
        self.frame_contexts.advance();
        Ok(submitted)
    }

    /// Blocks until the main-queue timeline value returned by a prior
    /// `draw_frame` call has completed on the GPU. Resources tied to that
    /// frame or earlier can be freely released once this returns.
    pub fn wait_frame_completion(&self, timeline_value: u64) -> Result<(), GfxError> {
        self.device.wait_for_timeline(Queue::Main, timeline_value)
    }
}
