//! LOD controller: points of interest, superchunk partitioning, and the
//! per-chunk control-block state machine, grounded on spec §4.J and
//! `original_source/src/common/terrain/controller.cpp` (pre-land-rename
//! terrain controller; same POI/superchunk/state-machine shape, retargeted
//! from a quadtree of terrain cells onto [`ChunkKey`]'s octree).

use super::key::{ChunkKey, CHUNK_SIZE};
use super::seam::{propagate_dirty_upward, rebuild_dirty_seams};
use glam::DVec3;
use std::collections::{HashMap, HashSet};

/// Points of interest not updated within this many ticks are evicted.
pub const MAX_POI_AGE: u32 = 300;
/// World is partitioned into superchunks at this fixed LOD.
pub const MAX_LOD: u8 = 6;
/// A superchunk engages when a POI comes within this many blocks of its center.
pub const SUPERCHUNK_ENGAGE_RADIUS: f64 = 1024.0;
/// Idle (disengaged) superchunks are unloaded after this many ticks.
pub const SUPERCHUNK_MAX_IDLE_AGE: u32 = 120;

/// Target angular diameter a chunk should subtend on screen, in degrees.
const TARGET_ANGULAR_DIAMETER_DEG: f64 = 50.0;
/// Scales a chunk's apparent radius relative to its side length.
const PSEUDO_RADIUS_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct PointOfInterest {
    pub position: DVec3,
    age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Loading,
    Standby,
    Active,
}

#[derive(Debug, Clone, Copy)]
pub struct ControlBlock {
    pub state: ChunkState,
    pub over_active: bool,
    pub chunk_copied: bool,
    pub chunk_changed: bool,
    pub induced_seam_dirty: bool,
    idle_ticks: u32,
}

impl ControlBlock {
    fn loading() -> Self {
        Self { state: ChunkState::Loading, over_active: false, chunk_copied: false, chunk_changed: false, induced_seam_dirty: false, idle_ticks: 0 }
    }
}

#[derive(Debug, Default)]
struct Superchunk {
    engaged: bool,
    idle_ticks: u32,
}

/// Ties points of interest, superchunk engagement, and the control-block
/// state machine together. Owns no rendering/generation state directly;
/// [`super::generator::LandGenerator`] and the mesh streamer act on the
/// control blocks this produces.
pub struct LandController {
    pois: HashMap<u64, PointOfInterest>,
    next_poi_id: u64,
    blocks: HashMap<ChunkKey, ControlBlock>,
    superchunks: HashMap<ChunkKey, Superchunk>,
    dirty_seams: HashSet<ChunkKey>,
    tick: u64,
}

impl Default for LandController {
    fn default() -> Self {
        Self::new()
    }
}

impl LandController {
    pub fn new() -> Self {
        Self { pois: HashMap::new(), next_poi_id: 1, blocks: HashMap::new(), superchunks: HashMap::new(), dirty_seams: HashSet::new(), tick: 0 }
    }

    pub fn add_poi(&mut self, position: DVec3) -> u64 {
        let id = self.next_poi_id;
        self.next_poi_id += 1;
        self.pois.insert(id, PointOfInterest { position, age: 0 });
        id
    }

    /// Refreshes a POI's position and resets its idle age.
    pub fn update_poi(&mut self, id: u64, position: DVec3) {
        if let Some(poi) = self.pois.get_mut(&id) {
            poi.position = position;
            poi.age = 0;
        }
    }

    pub fn remove_poi(&mut self, id: u64) {
        self.pois.remove(&id);
    }

    fn superchunk_extent(&self) -> i64 {
        CHUNK_SIZE << MAX_LOD
    }

    fn superchunk_key_of(&self, chunk: ChunkKey) -> ChunkKey {
        let mut key = chunk;
        while key.lod < MAX_LOD {
            key = key.parent();
        }
        key
    }

    fn superchunk_center(&self, key: ChunkKey) -> DVec3 {
        let (ox, oy, oz) = key.origin_blocks();
        let half = self.superchunk_extent() as f64 / 2.0;
        DVec3::new(ox as f64 + half, oy as f64 + half, oz as f64 + half)
    }

    fn nearest_poi_distance(&self, position: DVec3) -> Option<f64> {
        self.pois
            .values()
            .map(|poi| poi.position.distance(position))
            .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.min(d))))
    }

    /// LOD = max over POIs of `floor(log2(distance * tan(phi/2) / (pseudo_radius_factor * chunk_size)))`.
    pub fn desired_lod(&self, chunk_origin: DVec3) -> u8 {
        let phi = TARGET_ANGULAR_DIAMETER_DEG.to_radians();
        let mut max_lod: i64 = 0;
        for poi in self.pois.values() {
            let distance = poi.position.distance(chunk_origin).max(1e-3);
            let ratio = distance * (phi / 2.0).tan() / (PSEUDO_RADIUS_FACTOR * CHUNK_SIZE as f64);
            let lod = ratio.max(1.0).log2().floor() as i64;
            max_lod = max_lod.max(lod);
        }
        max_lod.clamp(0, MAX_LOD as i64) as u8
    }

    /// Advances POI ages, evicting idle ones; updates superchunk engagement
    /// and idle ages; walks every known control block applying the
    /// Loading/Standby/Active state machine; runs the two-phase seam pass
    /// over whatever keys changed state this tick.
    pub fn tick(&mut self) {
        self.tick += 1;
        self.pois.retain(|_, poi| {
            poi.age += 1;
            poi.age <= MAX_POI_AGE
        });

        let superchunk_keys: Vec<ChunkKey> = self.superchunks.keys().copied().collect();
        for key in superchunk_keys {
            let engaged = self.pois.values().any(|poi| {
                let center = self.superchunk_center(key);
                poi.position.distance(center) <= SUPERCHUNK_ENGAGE_RADIUS
            });
            let superchunk = self.superchunks.get_mut(&key).unwrap();
            superchunk.engaged = engaged;
            if engaged {
                superchunk.idle_ticks = 0;
            } else {
                superchunk.idle_ticks += 1;
            }
        }
        self.superchunks.retain(|_, s| s.idle_ticks < SUPERCHUNK_MAX_IDLE_AGE);

        let keys: Vec<ChunkKey> = self.blocks.keys().copied().collect();
        for key in keys {
            self.update_one(key);
        }

        let mut dirty = std::mem::take(&mut self.dirty_seams);
        rebuild_dirty_seams(&mut dirty, |_key| true);
        self.dirty_seams = dirty;
    }

    /// Ensures a chunk has a control block, engaging its superchunk.
    pub fn ensure_loading(&mut self, key: ChunkKey) {
        let superchunk = self.superchunk_key_of(key);
        self.superchunks.entry(superchunk).or_default();
        self.blocks.entry(key).or_insert_with(ControlBlock::loading);
    }

    pub fn control_block(&self, key: &ChunkKey) -> Option<&ControlBlock> {
        self.blocks.get(key)
    }

    fn chunk_center(key: ChunkKey) -> DVec3 {
        let (ox, oy, oz) = key.origin_blocks();
        let extent = key.extent_blocks() as f64;
        DVec3::new(ox as f64 + extent / 2.0, oy as f64 + extent / 2.0, oz as f64 + extent / 2.0)
    }

    fn wants_deterioration(&self, key: ChunkKey) -> bool {
        self.desired_lod(Self::chunk_center(key)) > key.lod
    }

    fn wants_improvement(&self, key: ChunkKey) -> bool {
        key.lod > 0 && self.desired_lod(Self::chunk_center(key)) < key.lod
    }

    fn update_one(&mut self, key: ChunkKey) {
        let Some(block) = self.blocks.get(&key).copied() else { return };
        match block.state {
            ChunkState::Loading => {
                self.blocks.get_mut(&key).unwrap().state = ChunkState::Standby;
                self.mark_changed(key);
            }
            ChunkState::Standby => {
                if key.lod > 0 {
                    let children = key.children();
                    let all_active = children.iter().all(|c| matches!(self.blocks.get(c), Some(b) if b.state == ChunkState::Active));
                    if all_active && children.iter().all(|c| self.wants_deterioration(*c)) {
                        for child in children {
                            self.blocks.remove(&child);
                        }
                        self.blocks.get_mut(&key).unwrap().state = ChunkState::Active;
                        self.mark_changed(key);
                        return;
                    }
                }
                let has_children = key.lod > 0 && key.children().iter().any(|c| self.blocks.contains_key(c));
                if !has_children && !self.wants_improvement(key) {
                    self.blocks.remove(&key);
                }
            }
            ChunkState::Active => {
                if self.wants_improvement(key) {
                    let children = key.children();
                    let all_loaded = children.iter().all(|c| self.blocks.contains_key(c));
                    if all_loaded {
                        let block = self.blocks.get_mut(&key).unwrap();
                        block.state = ChunkState::Standby;
                        block.over_active = true;
                        for child in children {
                            self.blocks.get_mut(&child).unwrap().state = ChunkState::Active;
                        }
                        self.mark_changed(key);
                    } else {
                        for child in children {
                            self.blocks.entry(child).or_insert_with(ControlBlock::loading);
                        }
                    }
                }
            }
        }
    }

    fn mark_changed(&mut self, key: ChunkKey) {
        if let Some(block) = self.blocks.get_mut(&key) {
            block.chunk_changed = true;
            block.induced_seam_dirty = true;
        }
        propagate_dirty_upward(key, MAX_LOD, &mut self.dirty_seams);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_poi_is_evicted_after_max_age() {
        let mut controller = LandController::new();
        let id = controller.add_poi(DVec3::ZERO);
        for _ in 0..MAX_POI_AGE {
            controller.tick();
        }
        assert!(controller.pois.contains_key(&id));
        controller.tick();
        assert!(!controller.pois.contains_key(&id));
    }

    #[test]
    fn refreshed_poi_is_not_evicted() {
        let mut controller = LandController::new();
        let id = controller.add_poi(DVec3::ZERO);
        for _ in 0..MAX_POI_AGE {
            controller.tick();
            controller.update_poi(id, DVec3::new(1.0, 0.0, 0.0));
        }
        assert!(controller.pois.contains_key(&id));
    }

    #[test]
    fn desired_lod_increases_with_distance() {
        let mut controller = LandController::new();
        controller.add_poi(DVec3::ZERO);
        let near = controller.desired_lod(DVec3::new(10.0, 0.0, 0.0));
        let far = controller.desired_lod(DVec3::new(100_000.0, 0.0, 0.0));
        assert!(far > near);
    }

    #[test]
    fn loading_chunk_transitions_to_standby_next_tick() {
        let mut controller = LandController::new();
        let key = ChunkKey::new(0, 0, 0, 0);
        controller.ensure_loading(key);
        assert_eq!(controller.control_block(&key).unwrap().state, ChunkState::Loading);
        controller.tick();
        assert_eq!(controller.control_block(&key).unwrap().state, ChunkState::Standby);
    }

    #[test]
    fn standby_chunk_with_no_children_and_no_demand_unloads() {
        let mut controller = LandController::new();
        let key = ChunkKey::new(0, 0, 0, 0);
        controller.ensure_loading(key);
        controller.tick(); // Loading -> Standby
        controller.tick(); // Standby, no children, no POIs -> unload
        assert!(controller.control_block(&key).is_none());
    }
}
