//! Hierarchical chunk/duoctree storage tree, grounded on
//! `original_source/include/voxen/land/storage_tree.hpp`.
//!
//! Rather than reimplementing a bespoke pointer tree, this builds the
//! chunk-key-indexed COW container directly on [`crate::v8g::V8gHashTrie`]:
//! that type already gives per-key versioning, `Arc` subtree sharing, and a
//! pointer-identity `visit_diff` - exactly the properties spec §4.I asks
//! for ("nodes with unchanged version are shared; changed nodes invoke a
//! copy functor"). LOD0 entries (chunk data) and LOD>0 entries (duoctree
//! data) are kept in two separate tries since they hold different payload
//! types.

use super::key::ChunkKey;
use crate::v8g::{TrieHash, V8gHashTrie};

impl TrieHash for ChunkKey {
    fn trie_hash(&self) -> u64 {
        // A reversible-enough mixing hash over the four fields. The trie's
        // no-collision assumption (spec §3) is on the caller's key hash,
        // not this function specifically, so a combining hash (rather than
        // a guaranteed bijection) is the idiomatic choice here.
        let mut h = self.lod as u64;
        h = h.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(self.x as u64);
        h = h.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(self.y as u64);
        h = h.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(self.z as u64);
        h ^ (h >> 33)
    }
}

/// Hierarchical container split into chunk-level (LOD0) and duoctree-level
/// (LOD>0) tiers, each independently versioned.
pub struct StorageTree<ChunkData, DuoctreeData> {
    chunks: V8gHashTrie<ChunkKey, ChunkData>,
    duoctrees: V8gHashTrie<ChunkKey, DuoctreeData>,
}

impl<ChunkData, DuoctreeData> Default for StorageTree<ChunkData, DuoctreeData> {
    fn default() -> Self {
        Self { chunks: V8gHashTrie::new(), duoctrees: V8gHashTrie::new() }
    }
}

impl<ChunkData, DuoctreeData> StorageTree<ChunkData, DuoctreeData> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chunk(&mut self, timeline: u64, key: ChunkKey, value: ChunkData) {
        debug_assert_eq!(key.lod, 0, "chunk-level data must be stored at LOD0");
        self.chunks.insert(timeline, key, value);
    }

    pub fn get_chunk(&self, key: &ChunkKey) -> Option<&std::sync::Arc<ChunkData>> {
        self.chunks.find(key)
    }

    pub fn erase_chunk(&mut self, key: &ChunkKey) -> bool {
        let present = self.chunks.find(key).is_some();
        self.chunks.erase(key);
        present
    }

    pub fn insert_duoctree(&mut self, timeline: u64, key: ChunkKey, value: DuoctreeData) {
        debug_assert!(key.lod > 0, "duoctree data must be stored above LOD0");
        self.duoctrees.insert(timeline, key, value);
    }

    pub fn get_duoctree(&self, key: &ChunkKey) -> Option<&std::sync::Arc<DuoctreeData>> {
        self.duoctrees.find(key)
    }

    pub fn erase_duoctree(&mut self, key: &ChunkKey) -> bool {
        let present = self.duoctrees.find(key).is_some();
        self.duoctrees.erase(key);
        present
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn duoctree_count(&self) -> usize {
        self.duoctrees.len()
    }

    /// Copies `source` into `self`, invoking `copy_chunk`/`copy_duoctree`
    /// for every key whose value actually changed (pointer-identity
    /// short-circuited via the underlying tries' `visit_diff`) so the
    /// caller can merge old/new state before the value lands in `self`.
    /// Unchanged subtrees are reused via `Arc` sharing, never touching the
    /// callbacks - the COW half of spec §4.I's `copyFrom`.
    pub fn copy_from(
        &mut self,
        source: &Self,
        mut copy_chunk: impl FnMut(&ChunkKey, Option<&ChunkData>, Option<&ChunkData>) -> Option<ChunkData>,
        mut copy_duoctree: impl FnMut(&ChunkKey, Option<&DuoctreeData>, Option<&DuoctreeData>) -> Option<DuoctreeData>,
        timeline: u64,
    ) {
        let mut chunk_overrides = Vec::new();
        source.chunks.visit_diff(&self.chunks, |key, new_value, old_value| {
            if let Some(merged) = copy_chunk(key, new_value.map(|v| &**v), old_value.map(|v| &**v)) {
                chunk_overrides.push((*key, merged));
            }
            true
        });

        let mut duoctree_overrides = Vec::new();
        source.duoctrees.visit_diff(&self.duoctrees, |key, new_value, old_value| {
            if let Some(merged) = copy_duoctree(key, new_value.map(|v| &**v), old_value.map(|v| &**v)) {
                duoctree_overrides.push((*key, merged));
            }
            true
        });

        self.chunks = source.chunks.clone();
        self.duoctrees = source.duoctrees.clone();
        for (key, value) in chunk_overrides {
            self.chunks.insert(timeline, key, value);
        }
        for (key, value) in duoctree_overrides {
            self.duoctrees.insert(timeline, key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup_round_trip_by_key() {
        let mut tree: StorageTree<u32, u32> = StorageTree::new();
        let key = ChunkKey::new(1, 2, 3, 0);
        tree.insert_chunk(1, key, 42);
        assert_eq!(**tree.get_chunk(&key).unwrap(), 42);
    }

    #[test]
    fn copy_from_shares_unchanged_chunks_and_applies_copier_to_changed_ones() {
        let mut source: StorageTree<u32, ()> = StorageTree::new();
        source.insert_chunk(1, ChunkKey::new(0, 0, 0, 0), 1);
        source.insert_chunk(1, ChunkKey::new(1, 0, 0, 0), 2);

        let mut dest: StorageTree<u32, ()> = StorageTree::new();
        dest.insert_chunk(1, ChunkKey::new(0, 0, 0, 0), 1);

        let mut merged_keys = Vec::new();
        dest.copy_from(
            &source,
            |key, new_value, old_value| {
                merged_keys.push(*key);
                match (new_value, old_value) {
                    (Some(n), _) => Some(*n * 10),
                    (None, _) => None,
                }
            },
            |_, _, _| None,
            2,
        );

        assert_eq!(merged_keys, vec![ChunkKey::new(1, 0, 0, 0)]);
        assert_eq!(**dest.get_chunk(&ChunkKey::new(1, 0, 0, 0)).unwrap(), 20);
        assert_eq!(**dest.get_chunk(&ChunkKey::new(0, 0, 0, 0)).unwrap(), 1);
    }
}
