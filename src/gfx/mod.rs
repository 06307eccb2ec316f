//! Graphics subsystem (components L-O): a thin `ash`-based Vulkan device
//! wrapper, the per-frame recyclable allocators built on top of it, a
//! declarative render graph, and the land draw-list glue tying it to
//! `land::LandController`. Grounded on `original_source/include/voxen/gfx/*`.

pub mod land_loader;
pub mod render_graph;
pub mod system;
pub mod vk;

pub use land_loader::{DrawCommand, LandLoader, SurfaceSource};
pub use system::GfxSystem;
