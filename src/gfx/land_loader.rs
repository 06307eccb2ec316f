//! Per-frame draw-list enumeration against LOD boxes (component M/J glue),
//! grounded on `original_source/src/voxen/gfx/gfx_land_loader.cpp`. Walks
//! the same LOD octree recursion as the original: request a draw command
//! for the current level first (so low-resolution data keeps streaming even
//! when finer data is available), then recurse into the 8 children and
//! prefer them if the whole subtree is covered, falling back to (or
//! substituting) the coarser level otherwise.

use crate::gfx::vk::mesh_streamer::{MeshAdd, MeshStreamer};
use crate::land::ChunkKey;

/// The surface currently known for a chunk key, as reported by whatever
/// owns land state this frame (`LandController` + the pseudo-chunk surface
/// table in this crate, `WorldState::landState()` in the original).
pub struct SurfaceSource {
    pub version: u64,
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DrawCommand {
    pub chunk_key: ChunkKey,
    pub mesh_key: u64,
    pub index_count: u32,
}

fn mesh_key_of(key: ChunkKey) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for part in [key.x as u64, key.y as u64, key.z as u64, key.lod as u64] {
        hash ^= part;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Owns the mesh streamer and produces per-frame draw lists against a
/// caller-supplied surface lookup.
pub struct LandLoader {
    streamer: MeshStreamer,
}

impl Default for LandLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LandLoader {
    pub fn new() -> Self {
        Self { streamer: MeshStreamer::new() }
    }

    pub fn streamer_mut(&mut self) -> &mut MeshStreamer {
        &mut self.streamer
    }

    pub fn begin_tick(&mut self) {
        self.streamer.begin_tick();
    }

    /// Requests streaming `key`'s latest surface version and returns a draw
    /// command for whichever version is currently ready, if any. A known
    /// empty chunk (`index_count == 0`) draws as an empty command rather
    /// than `None`, matching the original's "known empty" distinction from
    /// "not yet known".
    fn make_draw_command(&mut self, key: ChunkKey, source: &SurfaceSource) -> Option<DrawCommand> {
        let mesh_key = mesh_key_of(key);

        if source.index_count == 0 {
            return Some(DrawCommand { chunk_key: key, mesh_key, index_count: 0 });
        }

        let status = self.streamer.query_mesh(mesh_key);
        let pending = status.as_ref().map_or(0, |s| s.pending_version);
        let ready = status.as_ref().map_or(0, |s| s.ready_version);

        if source.version > pending.max(ready) {
            let _ = self.streamer.add_mesh(mesh_key, MeshAdd { element_size: std::mem::size_of::<u32>() as u32, element_count: source.index_count });
        }

        if ready == 0 {
            return None;
        }

        Some(DrawCommand { chunk_key: key, mesh_key, index_count: source.index_count })
    }

    /// Fills `draw_list` for the subtree rooted at `key`, recursing into
    /// children before falling back to `key`'s own level. Returns whether
    /// the whole subtree volume ended up covered by some draw command.
    fn make_draw_list_subtree(&mut self, draw_list: &mut Vec<DrawCommand>, key: ChunkKey, lookup: &impl Fn(ChunkKey) -> Option<SurfaceSource>) -> bool {
        let maybe_dcmd = lookup(key).and_then(|source| self.make_draw_command(key, &source));

        let rewind_position = draw_list.len();

        if key.lod > 0 {
            let mut all_covered = true;
            for child in key.children() {
                all_covered &= self.make_draw_list_subtree(draw_list, child, lookup);
            }
            if all_covered {
                return true;
            }
        }

        draw_list.truncate(rewind_position);

        let Some(dcmd) = maybe_dcmd else {
            return false;
        };

        if dcmd.index_count > 0 {
            draw_list.push(dcmd);
        }
        true
    }

    /// Builds the frame's draw list from the given set of LOD-box roots
    /// (one per LOD level, as produced by the land controller's superchunk
    /// bookkeeping).
    pub fn make_draw_list(&mut self, draw_list: &mut Vec<DrawCommand>, roots: impl IntoIterator<Item = ChunkKey>, lookup: &impl Fn(ChunkKey) -> Option<SurfaceSource>) {
        draw_list.clear();
        for root in roots {
            self.make_draw_list_subtree(draw_list, root, lookup);
        }
    }
}
