//! Typed façade over [`StorageTree`] splitting chunk/duoctree payloads into
//! shared (refcount-shared across snapshots) and private (single-writer)
//! halves, grounded on
//! `original_source/include/voxen/land/typed_storage_tree.hpp`.
//!
//! The original's `void`-able template parameters (any of the four payload
//! types may be absent) become `()` here - `TypedStorageTree<(), P, S, ()>`
//! is a perfectly normal instantiation, not a special case.

use super::key::ChunkKey;
use super::storage_tree::StorageTree;
use std::sync::Arc;

/// One tier's payload: shared data visible to every holder of this node's
/// version, plus private data owned exclusively by whichever writer
/// produced this version.
#[derive(Clone)]
pub struct NodeData<Shared, Private> {
    pub shared: Arc<Shared>,
    pub private: Private,
}

impl<Shared, Private> NodeData<Shared, Private> {
    pub fn new(shared: Shared, private: Private) -> Self {
        Self { shared: Arc::new(shared), private }
    }
}

pub type ChunkNode<ChunkShared, ChunkPrivate> = NodeData<ChunkShared, ChunkPrivate>;
pub type DuoctreeNode<DuoctreeShared, DuoctreePrivate> = NodeData<DuoctreeShared, DuoctreePrivate>;

/// `TypedStorageTree<ChunkShared, ChunkPrivate, DuoctreeShared, DuoctreePrivate>`.
pub struct TypedStorageTree<ChunkShared, ChunkPrivate, DuoctreeShared, DuoctreePrivate> {
    inner: StorageTree<ChunkNode<ChunkShared, ChunkPrivate>, DuoctreeNode<DuoctreeShared, DuoctreePrivate>>,
}

impl<CS, CP, DS, DP> Default for TypedStorageTree<CS, CP, DS, DP> {
    fn default() -> Self {
        Self { inner: StorageTree::new() }
    }
}

impl<CS, CP, DS, DP> TypedStorageTree<CS, CP, DS, DP> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chunk(&mut self, timeline: u64, key: ChunkKey, shared: CS, private: CP) {
        self.inner.insert_chunk(timeline, key, NodeData::new(shared, private));
    }

    pub fn chunk(&self, key: &ChunkKey) -> Option<&Arc<ChunkNode<CS, CP>>> {
        self.inner.get_chunk(key)
    }

    pub fn insert_duoctree(&mut self, timeline: u64, key: ChunkKey, shared: DS, private: DP) {
        self.inner.insert_duoctree(timeline, key, NodeData::new(shared, private));
    }

    pub fn duoctree(&self, key: &ChunkKey) -> Option<&Arc<DuoctreeNode<DS, DP>>> {
        self.inner.get_duoctree(key)
    }

    /// Copies `source` into `self`. `copy_chunk_shared`/`copy_duoctree_shared`
    /// decide the destination's new shared payload for any key whose shared
    /// data actually changed; private data is always moved wholesale from
    /// `source` for changed keys (it has no prior owner to merge with),
    /// matching spec §4.I "private data is moved from source to
    /// destination".
    pub fn copy_from(
        &mut self,
        source: &Self,
        timeline: u64,
        mut copy_chunk_shared: impl FnMut(&ChunkKey, &CS, Option<&CS>) -> CS,
        mut copy_duoctree_shared: impl FnMut(&ChunkKey, &DS, Option<&DS>) -> DS,
    ) where
        CP: Clone,
        DP: Clone,
    {
        self.inner.copy_from(
            &source.inner,
            |key, new_value, old_value| {
                new_value.map(|new_node| {
                    let shared = copy_chunk_shared(key, &new_node.shared, old_value.map(|o| &*o.shared));
                    NodeData { shared: Arc::new(shared), private: new_node.private.clone() }
                })
            },
            |key, new_value, old_value| {
                new_value.map(|new_node| {
                    let shared = copy_duoctree_shared(key, &new_node.shared, old_value.map(|o| &*o.shared));
                    NodeData { shared: Arc::new(shared), private: new_node.private.clone() }
                })
            },
            timeline,
        );
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.chunk_count()
    }

    pub fn duoctree_count(&self) -> usize {
        self.inner.duoctree_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_and_private_round_trip() {
        let mut tree: TypedStorageTree<u32, String, (), ()> = TypedStorageTree::new();
        let key = ChunkKey::new(0, 0, 0, 0);
        tree.insert_chunk(1, key, 7, "owner-a".to_string());
        let node = tree.chunk(&key).unwrap();
        assert_eq!(*node.shared, 7);
        assert_eq!(node.private, "owner-a");
    }

    #[test]
    fn copy_from_merges_shared_payload_for_changed_keys() {
        let mut source: TypedStorageTree<u32, (), (), ()> = TypedStorageTree::new();
        let key = ChunkKey::new(1, 0, 0, 0);
        source.insert_chunk(1, key, 5, ());

        let mut dest: TypedStorageTree<u32, (), (), ()> = TypedStorageTree::new();
        dest.copy_from(&source, 2, |_, new_shared, old_shared| new_shared + old_shared.copied().unwrap_or(0), |_, new_shared, _| *new_shared);

        assert_eq!(*dest.chunk(&key).unwrap().shared, 5);
    }
}
