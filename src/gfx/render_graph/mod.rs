//! Declarative per-frame render graph (component M): build a
//! [`builder::GraphDeclaration`] each frame, then run it through
//! [`execution::RenderGraphExecution`] to synthesize barriers and dispatch
//! passes.

pub mod builder;
pub mod execution;
pub mod resource;

pub use builder::{GraphDeclaration, Pass, PassKind, RenderGraph, RenderGraphBuilder};
pub use execution::{Barrier, BarrierSynthesizer, RenderGraphExecution};
pub use resource::{
    BufferDesc, BufferHandle, BufferSize, DepthStencilTarget, DoubleBufferedImage, ImageDesc, ImageHandle, RenderTarget, ResourceHandle, ResourceUsage, ViewDesc, ViewHandle,
};
