//! Two-level compressed chunk storage, grounded on
//! `original_source/include/voxen/land/compressed_chunk_storage.hpp`.
//!
//! A `32^3` chunk is split into 64 `8^3` subchunks (a `4^3` grid, addressed
//! with [`FixedBitset64`]), and each non-uniform subchunk into 64 `2^3`
//! leaves (another `4^3` grid within the subchunk). A chunk that is
//! entirely one value allocates nothing beyond the struct itself - the
//! `node_mask`/`leaf_mask` invariant from spec §4.H.

use super::cube_array::{CubeArrayView, CubeArrayViewMut};
use crate::util::bitset::FixedBitset64;
use crate::util::error::GfxError;

const CHUNK_SIDE: usize = 32;
const SUBCHUNK_SIDE: usize = 8;
const LEAF_SIDE: usize = 2;
/// Subchunks/leaves per axis: `32/8 == 4`, `8/2 == 4`.
const GRID_SIDE: usize = 4;

fn subchunk_coord(v: usize) -> usize {
    v / SUBCHUNK_SIDE
}

fn leaf_coord(v: usize) -> usize {
    (v % SUBCHUNK_SIDE) / LEAF_SIDE
}

#[derive(Clone)]
struct Subchunk<T> {
    leaf_mask: FixedBitset64,
    /// Fallback value for leaves whose `leaf_mask` bit is clear.
    uniform_values: [T; 64],
    /// Present only for leaves whose `leaf_mask` bit is set; YXZ order.
    leaves: Vec<Option<Box<[T; 8]>>>,
}

impl<T: Copy + PartialEq> Subchunk<T> {
    fn new(fill: T) -> Self {
        Self { leaf_mask: FixedBitset64::new(), uniform_values: [fill; 64], leaves: vec![None; 64] }
    }

    fn get(&self, ly: usize, lx: usize, lz: usize) -> T {
        let (gy, gx, gz) = (leaf_coord(ly), leaf_coord(lx), leaf_coord(lz));
        let idx = FixedBitset64::index(gy, gx, gz) as usize;
        if self.leaf_mask.get(gy, gx, gz) {
            let leaf = self.leaves[idx].as_ref().expect("leaf mask bit set implies leaf present");
            leaf[leaf_within_index(ly, lx, lz)]
        } else {
            self.uniform_values[idx]
        }
    }

    fn set(&mut self, ly: usize, lx: usize, lz: usize, value: T) {
        let (gy, gx, gz) = (leaf_coord(ly), leaf_coord(lx), leaf_coord(lz));
        let idx = FixedBitset64::index(gy, gx, gz) as usize;
        let within = leaf_within_index(ly, lx, lz);

        if !self.leaf_mask.get(gy, gx, gz) {
            let uniform = self.uniform_values[idx];
            if uniform == value {
                return;
            }
            let mut leaf = Box::new([uniform; 8]);
            leaf[within] = value;
            self.leaves[idx] = Some(leaf);
            self.leaf_mask.set(gy, gx, gz, true);
        } else {
            let leaf = self.leaves[idx].as_mut().unwrap();
            leaf[within] = value;
            if leaf.iter().all(|v| *v == leaf[0]) {
                self.uniform_values[idx] = leaf[0];
                self.leaves[idx] = None;
                self.leaf_mask.set(gy, gx, gz, false);
            }
        }
    }
}

fn leaf_within_index(ly: usize, lx: usize, lz: usize) -> usize {
    (ly % LEAF_SIDE) * 4 + (lx % LEAF_SIDE) * 2 + (lz % LEAF_SIDE)
}

/// Compressed `32^3` storage for material/attribute arrays (`T` is
/// typically `u16` block ids, but any `Copy + PartialEq` scalar works).
#[derive(Clone)]
pub struct CompressedChunkStorage<T> {
    uniform_value: T,
    node_mask: FixedBitset64,
    subchunks: Vec<Option<Box<Subchunk<T>>>>,
}

impl<T: Copy + PartialEq + Default> Default for CompressedChunkStorage<T> {
    fn default() -> Self {
        Self::new_uniform(T::default())
    }
}

impl<T: Copy + PartialEq> CompressedChunkStorage<T> {
    pub fn new_uniform(value: T) -> Self {
        Self { uniform_value: value, node_mask: FixedBitset64::new(), subchunks: vec![None; 64] }
    }

    /// Builds the compressed representation from a dense `32^3` view.
    pub fn from_view(view: CubeArrayView<'_, T>) -> Self {
        assert_eq!(view.side(), CHUNK_SIDE);
        if view.is_uniform() {
            return Self::new_uniform(view.get(0, 0, 0));
        }

        let uniform_value = view.get(0, 0, 0);
        let mut storage = Self::new_uniform(uniform_value);
        for y in 0..CHUNK_SIDE {
            for x in 0..CHUNK_SIDE {
                for z in 0..CHUNK_SIDE {
                    storage.set(y, x, z, view.get(y, x, z));
                }
            }
        }
        storage
    }

    pub fn load(&self, y: usize, x: usize, z: usize) -> T {
        let (sy, sx, sz) = (subchunk_coord(y), subchunk_coord(x), subchunk_coord(z));
        if !self.node_mask.get(sy, sx, sz) {
            return self.uniform_value;
        }
        let idx = FixedBitset64::index(sy, sx, sz) as usize;
        let subchunk = self.subchunks[idx].as_ref().expect("node mask bit set implies subchunk present");
        subchunk.get(y, x, z)
    }

    pub fn set(&mut self, y: usize, x: usize, z: usize, value: T) {
        let (sy, sx, sz) = (subchunk_coord(y), subchunk_coord(x), subchunk_coord(z));
        let idx = FixedBitset64::index(sy, sx, sz) as usize;

        if !self.node_mask.get(sy, sx, sz) {
            if self.uniform_value == value {
                return;
            }
            let mut subchunk = Box::new(Subchunk::new(self.uniform_value));
            subchunk.set(y, x, z, value);
            self.subchunks[idx] = Some(subchunk);
            self.node_mask.set(sy, sx, sz, true);
        } else {
            let subchunk = self.subchunks[idx].as_mut().unwrap();
            subchunk.set(y, x, z, value);
            // Only collapse back to "absent" if the subchunk converged on the
            // chunk's own background value - `uniform_value` is shared by
            // every other still-absent subchunk's `load()`, so collapsing on
            // any other converged value would corrupt their reads.
            if subchunk.leaf_mask.is_empty() && subchunk.uniform_values.iter().all(|v| *v == self.uniform_value) {
                self.subchunks[idx] = None;
                self.node_mask.set(sy, sx, sz, false);
            }
        }
    }

    /// Writes the full dense representation back out.
    pub fn expand(&self, mut view: CubeArrayViewMut<'_, T>) {
        assert_eq!(view.side(), CHUNK_SIDE);
        for y in 0..CHUNK_SIDE {
            for x in 0..CHUNK_SIDE {
                for z in 0..CHUNK_SIDE {
                    view.set(y, x, z, self.load(y, x, z));
                }
            }
        }
    }

    pub fn set_uniform(&mut self, value: T) {
        self.uniform_value = value;
        self.node_mask = FixedBitset64::new();
        self.subchunks = vec![None; 64];
    }

    pub fn is_uniform(&self) -> bool {
        self.node_mask.is_empty()
    }

    pub fn uniform_value(&self) -> Option<T> {
        self.is_uniform().then_some(self.uniform_value)
    }
}

/// Validates a requested array size against the mesh/storage 16-bit index
/// limits used elsewhere in `land` (shared error type for "too large" data).
pub fn check_vertex_budget(count: usize, limit: usize, what: &'static str) -> Result<(), GfxError> {
    if count > limit {
        return Err(GfxError::DataTooLarge { what, actual: count, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::land::cube_array::CubeArray;

    #[test]
    fn uniform_chunk_allocates_no_subchunks() {
        let storage: CompressedChunkStorage<u16> = CompressedChunkStorage::new_uniform(7);
        assert!(storage.is_uniform());
        assert_eq!(storage.load(0, 0, 0), 7);
        assert_eq!(storage.load(31, 31, 31), 7);
    }

    #[test]
    fn set_single_voxel_then_load_round_trips() {
        let mut storage: CompressedChunkStorage<u16> = CompressedChunkStorage::new_uniform(0);
        storage.set(5, 5, 5, 42);
        assert_eq!(storage.load(5, 5, 5), 42);
        assert_eq!(storage.load(0, 0, 0), 0);
        assert!(!storage.is_uniform());
    }

    #[test]
    fn collapsing_back_to_uniform_clears_nodes() {
        let mut storage: CompressedChunkStorage<u16> = CompressedChunkStorage::new_uniform(0);
        storage.set(5, 5, 5, 42);
        storage.set(5, 5, 5, 0);
        assert!(storage.is_uniform());
    }

    #[test]
    fn filling_one_subchunk_to_a_non_background_value_does_not_leak_into_other_subchunks() {
        let mut storage: CompressedChunkStorage<u16> = CompressedChunkStorage::new_uniform(0);

        // Fill every cell of the subchunk at (0,0,0) (y,x,z in 0..8) to 42,
        // matching spec §8 Concrete Scenario 3: the subchunk becomes
        // internally uniform again and should collapse back to "absent",
        // but it must not clobber the chunk-wide background value other
        // absent subchunks fall back to.
        for y in 0..8 {
            for x in 0..8 {
                for z in 0..8 {
                    storage.set(y, x, z, 42);
                }
            }
        }
        assert_eq!(storage.load(0, 0, 0), 42);
        assert_eq!(storage.load(7, 7, 7), 42);

        // An untouched subchunk elsewhere in the chunk must still read the
        // original background value, not 42.
        assert_eq!(storage.load(16, 16, 16), 0);
        assert_eq!(storage.load(31, 31, 31), 0);

        // Round-trip through expand() must also reflect this correctly.
        let mut out: CubeArray<u16, 32> = CubeArray::filled(99);
        storage.expand(out.view_mut());
        assert_eq!(out.get(0, 0, 0), 42);
        assert_eq!(out.get(16, 16, 16), 0);
    }

    #[test]
    fn from_view_then_expand_round_trips_a_dense_array() {
        let mut dense: CubeArray<u16, 32> = CubeArray::filled(0);
        dense.set(0, 0, 0, 1);
        dense.set(31, 31, 31, 2);
        dense.set(16, 16, 16, 3);

        let storage = CompressedChunkStorage::from_view(dense.view());
        let mut out: CubeArray<u16, 32> = CubeArray::filled(99);
        storage.expand(out.view_mut());

        for y in 0..32 {
            for x in 0..32 {
                for z in 0..32 {
                    assert_eq!(out.get(y, x, z), dense.get(y, x, z));
                }
            }
        }
    }
}
