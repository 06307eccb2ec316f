//! Voxel engine core library: land LOD subsystem, versioning containers,
//! and the task/message/render-graph substrate it's built on.
//!
//! Module groups, bottom-up:
//! - [`util`], [`os`] - error kinds, logging, bit-level helpers, OS file/futex primitives.
//! - [`svc`] - service locator, task execution, message passing, pipe memory, object pools.
//! - [`v8g`] - versioned containers (hash trie, flat map) used by the land storage tree.
//! - [`land`] - chunk storage, the COW storage tree, pseudo-chunk surfaces, generation, LOD control.
//! - [`gfx`] - the Vulkan device wrapper, per-frame allocators, and the render graph.
//! - [`config`] - the on-disk `main_config.toml`.

pub mod config;
pub mod gfx;
pub mod land;
pub mod os;
pub mod svc;
pub mod util;
pub mod v8g;

/// Current engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
