//! Bump/slab mesh substream allocator, grounded on spec §4.O and
//! `original_source/include/voxen/gfx/vk/vk_mesh_streamer.hpp`.
//!
//! One `VkBuffer` pool per element-size class; `add_mesh` reserves a range
//! and records the upload as pending until the frame that copy ran in
//! completes. Keys are LRU-ordered by last access for eviction under
//! pressure; exhausted pools can be defragmented by copying live
//! substreams into a fresh pool.

use std::collections::{HashMap, VecDeque};

pub type MeshKey = u64;

#[derive(Debug, Clone, Copy)]
pub struct MeshAdd {
    pub element_size: u32,
    pub element_count: u32,
}

struct Substream {
    pool_class: u32,
    offset: u32,
    element_count: u32,
    pending_version: u64,
    ready_version: u64,
    last_access_tick: u64,
}

struct Pool {
    element_size: u32,
    capacity_elements: u32,
    used_elements: u32,
    fragmented_elements: u32,
}

impl Pool {
    fn new(element_size: u32, capacity_elements: u32) -> Self {
        Self { element_size, capacity_elements, used_elements: 0, fragmented_elements: 0 }
    }

    fn try_reserve(&mut self, count: u32) -> Option<u32> {
        if self.used_elements + count > self.capacity_elements {
            return None;
        }
        let offset = self.used_elements;
        self.used_elements += count;
        Some(offset)
    }

    fn fragmentation_ratio(&self) -> f64 {
        if self.capacity_elements == 0 {
            0.0
        } else {
            self.fragmented_elements as f64 / self.capacity_elements as f64
        }
    }
}

const DEFRAGMENT_THRESHOLD: f64 = 0.35;

pub struct MeshStreamResult {
    pub ready_version: u64,
    pub pending_version: u64,
}

/// Streams mesh substreams into per-element-size-class `VkBuffer` pools.
/// Actual GPU copy recording is left to the caller (via
/// [`MeshStreamer::drain_transfers`]); this type owns the allocation and
/// versioning bookkeeping.
pub struct MeshStreamer {
    pools: HashMap<u32, Pool>,
    substreams: HashMap<MeshKey, Substream>,
    lru: VecDeque<MeshKey>,
    next_version: u64,
    tick: u64,
}

pub struct Transfer {
    pub key: MeshKey,
    pub pool_class: u32,
    pub offset: u32,
    pub element_count: u32,
    pub version: u64,
}

/// One substream's move during [`MeshStreamer::defragment_pool`]. The caller
/// must record a GPU copy from `old_offset` to `new_offset` (`element_count`
/// elements) before the defragmented pool's old backing buffer is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub key: MeshKey,
    pub old_offset: u32,
    pub new_offset: u32,
    pub element_count: u32,
}

impl Default for MeshStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshStreamer {
    pub fn new() -> Self {
        Self { pools: HashMap::new(), substreams: HashMap::new(), lru: VecDeque::new(), next_version: 1, tick: 0 }
    }

    fn pool_for(&mut self, element_size: u32) -> &mut Pool {
        self.pools.entry(element_size).or_insert_with(|| Pool::new(element_size, 1 << 16))
    }

    /// Enqueues a transfer for `key`. If `key` already has data, the old
    /// substream's space is marked fragmented once the new one lands.
    /// Returns the version this add will become once its GPU copy
    /// completes, or `None` if the pool is exhausted (caller should
    /// defragment or grow the pool and retry).
    pub fn add_mesh(&mut self, key: MeshKey, add: MeshAdd) -> Option<(u64, Transfer)> {
        let version = self.next_version;
        self.next_version += 1;

        let offset = {
            let pool = self.pool_for(add.element_size);
            pool.try_reserve(add.element_count)?
        };

        if let Some(old) = self.substreams.get(&key) {
            if let Some(pool) = self.pools.get_mut(&old.pool_class) {
                pool.fragmented_elements += old.element_count;
            }
        }

        self.substreams.insert(key, Substream { pool_class: add.element_size, offset, element_count: add.element_count, pending_version: version, ready_version: 0, last_access_tick: self.tick });
        self.touch(key);

        Some((version, Transfer { key, pool_class: add.element_size, offset, element_count: add.element_count, version }))
    }

    /// Marks `version` of `key`'s substream as GPU-complete.
    pub fn complete_transfer(&mut self, key: MeshKey, version: u64) {
        if let Some(substream) = self.substreams.get_mut(&key) {
            if substream.pending_version == version {
                substream.ready_version = version;
            }
        }
    }

    /// Reports the ready/pending versions for `key`. If `pending <
    /// requested_version`, the caller should submit a new `add_mesh`.
    pub fn query_mesh(&mut self, key: MeshKey) -> Option<MeshStreamResult> {
        self.touch(key);
        let substream = self.substreams.get(&key)?;
        Some(MeshStreamResult { ready_version: substream.ready_version, pending_version: substream.pending_version })
    }

    fn touch(&mut self, key: MeshKey) {
        self.lru.retain(|&k| k != key);
        self.lru.push_back(key);
        if let Some(substream) = self.substreams.get_mut(&key) {
            substream.last_access_tick = self.tick;
        }
    }

    /// Evicts the least-recently-used substream, freeing its pool's
    /// fragmented-element count for later defragmentation accounting.
    /// Returns the evicted key, if any.
    pub fn evict_lru(&mut self) -> Option<MeshKey> {
        let key = self.lru.pop_front()?;
        if let Some(substream) = self.substreams.remove(&key) {
            if let Some(pool) = self.pools.get_mut(&substream.pool_class) {
                pool.fragmented_elements += substream.element_count;
            }
        }
        Some(key)
    }

    /// Pool classes whose fragmentation ratio has crossed the
    /// defragmentation threshold.
    pub fn pools_needing_defragmentation(&self) -> Vec<u32> {
        self.pools.iter().filter(|(_, pool)| pool.fragmentation_ratio() > DEFRAGMENT_THRESHOLD).map(|(&class, _)| class).collect()
    }

    /// Compacts `class`'s pool: allocates a fresh pool of the same capacity
    /// and copies every still-live substream into it in LRU order (oldest
    /// first), rewriting each substream's `offset` in place. Stale holes left
    /// by replaced/evicted substreams are simply not carried over, so the new
    /// pool ends with zero fragmentation. No-op (returns an empty list) if
    /// `class` has no pool. The actual GPU-side byte copy is the caller's
    /// responsibility - this only updates the allocator's own bookkeeping and
    /// reports what moved where.
    pub fn defragment_pool(&mut self, class: u32) -> Vec<Relocation> {
        let (element_size, capacity_elements) = match self.pools.get(&class) {
            Some(pool) => (pool.element_size, pool.capacity_elements),
            None => return Vec::new(),
        };

        let mut new_pool = Pool::new(element_size, capacity_elements);
        let mut relocations = Vec::new();

        for &key in &self.lru {
            let Some(substream) = self.substreams.get_mut(&key) else { continue };
            if substream.pool_class != class {
                continue;
            }
            let new_offset = new_pool
                .try_reserve(substream.element_count)
                .expect("a defragmented pool must fit every substream it previously held");
            if new_offset != substream.offset {
                relocations.push(Relocation { key, old_offset: substream.offset, new_offset, element_count: substream.element_count });
            }
            substream.offset = new_offset;
        }

        self.pools.insert(class, new_pool);
        relocations
    }

    pub fn begin_tick(&mut self) {
        self.tick += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_mesh_then_complete_advances_ready_version() {
        let mut streamer = MeshStreamer::new();
        let (version, transfer) = streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 100 }).unwrap();
        assert_eq!(transfer.key, 1);

        let before = streamer.query_mesh(1).unwrap();
        assert_eq!(before.ready_version, 0);
        assert_eq!(before.pending_version, version);

        streamer.complete_transfer(1, version);
        let after = streamer.query_mesh(1).unwrap();
        assert_eq!(after.ready_version, version);
    }

    #[test]
    fn replacing_a_mesh_fragments_the_old_allocation() {
        let mut streamer = MeshStreamer::new();
        streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 100 }).unwrap();
        streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 50 }).unwrap();
        assert_eq!(streamer.pools.get(&32).unwrap().fragmented_elements, 100);
    }

    #[test]
    fn lru_eviction_removes_the_least_recently_queried_key() {
        let mut streamer = MeshStreamer::new();
        streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 10 }).unwrap();
        streamer.add_mesh(2, MeshAdd { element_size: 32, element_count: 10 }).unwrap();
        streamer.query_mesh(1);
        let evicted = streamer.evict_lru();
        assert_eq!(evicted, Some(2));
    }

    #[test]
    fn defragment_pool_compacts_live_substreams_and_reports_relocations() {
        let mut streamer = MeshStreamer::new();
        streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 100 }).unwrap();
        streamer.add_mesh(2, MeshAdd { element_size: 32, element_count: 50 }).unwrap();
        // Replace key 1's allocation, leaving a 100-element stale hole behind it.
        streamer.add_mesh(1, MeshAdd { element_size: 32, element_count: 10 }).unwrap();

        assert_eq!(streamer.pools.get(&32).unwrap().used_elements, 160);

        let relocations = streamer.defragment_pool(32);

        let pool = streamer.pools.get(&32).unwrap();
        assert_eq!(pool.used_elements, 60);
        assert_eq!(pool.fragmented_elements, 0);

        // lru order is [1, 2, 1] collapsed by `touch` to [2, 1] (key 1 re-touched last),
        // so key 2 is compacted first.
        let by_key = |key: MeshKey| relocations.iter().find(|r| r.key == key).copied().unwrap();
        assert_eq!(streamer.substreams.get(&2).unwrap().offset, 0);
        assert_eq!(streamer.substreams.get(&1).unwrap().offset, 50);

        let r2 = by_key(2);
        assert_eq!(r2.old_offset, 100);
        assert_eq!(r2.new_offset, 0);
        assert_eq!(r2.element_count, 50);

        let r1 = by_key(1);
        assert_eq!(r1.old_offset, 150);
        assert_eq!(r1.new_offset, 50);
        assert_eq!(r1.element_count, 10);
    }

    #[test]
    fn defragment_pool_on_unknown_class_is_a_no_op() {
        let mut streamer = MeshStreamer::new();
        assert!(streamer.defragment_pool(99).is_empty());
    }
}
