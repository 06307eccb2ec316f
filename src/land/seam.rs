//! Two-phase seam dirty-propagation and rebuild, grounded on
//! `original_source/src/common/terrain/controller_seam_ops.cpp` (pre-rename
//! terrain controller; the land controller reuses the same recursion
//! shape over [`ChunkKey`] octree structure instead of the old terrain
//! quadtree).
//!
//! Phase 1 walks up from chunks whose neighbour LOD relationship changed,
//! marking `induced_seam_dirty` on every ancestor whose face/edge/cell
//! touches the change. Phase 2 walks back down over dirty nodes rebuilding
//! seam surfaces and clearing the flag - kept as two passes so phase 1 can
//! run eagerly per-chunk-change while phase 2 batches per tick.

use super::key::ChunkKey;
use std::collections::HashSet;

/// Marks `key` and every ancestor up to `root_lod` dirty, returning the set
/// of newly-dirtied keys (phase 1: propagate up).
pub fn propagate_dirty_upward(key: ChunkKey, root_lod: u8, dirty: &mut HashSet<ChunkKey>) -> Vec<ChunkKey> {
    let mut newly_dirtied = Vec::new();
    let mut current = key;
    loop {
        if !dirty.insert(current) {
            // Already dirty (and so is everything above it from a prior call).
            break;
        }
        newly_dirtied.push(current);
        if current.lod >= root_lod {
            break;
        }
        current = current.parent();
    }
    newly_dirtied
}

/// Rebuilds seams bottom-up: processes `dirty` in ascending LOD order so a
/// parent's rebuild can assume its children already have fresh seams, then
/// clears the flag for every key touched. `rebuild_one` performs the actual
/// per-key seam surface rebuild (grounded on `generatePseudoChunk`/pseudo-chunk
/// aggregation elsewhere in `land`) and reports success.
pub fn rebuild_dirty_seams(dirty: &mut HashSet<ChunkKey>, mut rebuild_one: impl FnMut(ChunkKey) -> bool) {
    let mut ordered: Vec<ChunkKey> = dirty.iter().copied().collect();
    ordered.sort_by_key(|k| k.lod);

    for key in ordered {
        if rebuild_one(key) {
            dirty.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagate_dirty_upward_marks_every_ancestor_once() {
        let mut dirty = HashSet::new();
        let leaf = ChunkKey::new(4, 4, 4, 0);
        let newly = propagate_dirty_upward(leaf, 3, &mut dirty);
        assert_eq!(newly.len(), 4); // lod 0,1,2,3
        assert!(dirty.contains(&leaf));
        assert!(dirty.contains(&leaf.parent().parent().parent()));
    }

    #[test]
    fn propagating_an_already_dirty_chain_adds_nothing_new() {
        let mut dirty = HashSet::new();
        let leaf = ChunkKey::new(0, 0, 0, 0);
        propagate_dirty_upward(leaf, 2, &mut dirty);
        let newly = propagate_dirty_upward(leaf, 2, &mut dirty);
        assert!(newly.is_empty());
    }

    #[test]
    fn rebuild_dirty_seams_processes_children_before_parents_and_clears_flags() {
        let mut dirty = HashSet::new();
        let leaf = ChunkKey::new(0, 0, 0, 0);
        propagate_dirty_upward(leaf, 2, &mut dirty);

        let mut order = Vec::new();
        rebuild_dirty_seams(&mut dirty, |key| {
            order.push(key.lod);
            true
        });

        assert_eq!(order, vec![0, 1, 2]);
        assert!(dirty.is_empty());
    }

    #[test]
    fn rebuild_failure_keeps_the_key_dirty_for_the_next_tick() {
        let mut dirty = HashSet::new();
        let leaf = ChunkKey::new(0, 0, 0, 0);
        propagate_dirty_upward(leaf, 0, &mut dirty);
        rebuild_dirty_seams(&mut dirty, |_| false);
        assert!(dirty.contains(&leaf));
    }
}
