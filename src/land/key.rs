//! Chunk key: `(x, y, z, lod)`, grounded on spec §3 DATA MODEL and
//! `original_source/include/voxen/land/chunk_key.hpp`.

/// Chunks are fixed at 32 blocks per side at LOD 0.
pub const CHUNK_SIZE: i64 = 32;

/// `(x, y, z, lod)`. A chunk at LOD `L` covers `CHUNK_SIZE * 2^L` blocks per
/// side, with `x`/`y`/`z` measured in chunk-sized units at that LOD (not in
/// blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub lod: u8,
}

impl ChunkKey {
    pub const fn new(x: i64, y: i64, z: i64, lod: u8) -> Self {
        Self { x, y, z, lod }
    }

    /// Side length of this chunk's region, in blocks.
    pub fn extent_blocks(&self) -> i64 {
        CHUNK_SIZE << self.lod
    }

    /// The 8 children obtained by halving this key's region. Panics if
    /// `lod == 0` (LOD 0 chunks have no children).
    pub fn children(&self) -> [ChunkKey; 8] {
        assert!(self.lod > 0, "chunk key at LOD 0 has no children");
        let child_lod = self.lod - 1;
        let bx = self.x * 2;
        let by = self.y * 2;
        let bz = self.z * 2;
        let mut out = [ChunkKey::new(0, 0, 0, child_lod); 8];
        let mut i = 0;
        for dy in 0..2 {
            for dx in 0..2 {
                for dz in 0..2 {
                    out[i] = ChunkKey::new(bx + dx, by + dy, bz + dz, child_lod);
                    i += 1;
                }
            }
        }
        out
    }

    /// The parent key obtained by aligning this key down to the next LOD.
    pub fn parent(&self) -> ChunkKey {
        ChunkKey::new(self.x.div_euclid(2), self.y.div_euclid(2), self.z.div_euclid(2), self.lod + 1)
    }

    /// World-space origin of this chunk, in blocks.
    pub fn origin_blocks(&self) -> (i64, i64, i64) {
        let extent = self.extent_blocks();
        (self.x * extent, self.y * extent, self.z * extent)
    }

    /// Index of `self` among its parent's 8 children (YXZ order, matching
    /// [`ChunkKey::children`]'s emission order).
    pub fn child_index(&self) -> usize {
        let dy = (self.y.rem_euclid(2)) as usize;
        let dx = (self.x.rem_euclid(2)) as usize;
        let dz = (self.z.rem_euclid(2)) as usize;
        dy * 4 + dx * 2 + dz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_and_parent_round_trip() {
        let parent = ChunkKey::new(3, -2, 5, 2);
        let children = parent.children();
        assert_eq!(children.len(), 8);
        for child in children {
            assert_eq!(child.lod, 1);
            assert_eq!(child.parent(), parent);
        }
    }

    #[test]
    fn child_index_matches_emission_order() {
        let parent = ChunkKey::new(0, 0, 0, 1);
        let children = parent.children();
        for (i, child) in children.iter().enumerate() {
            assert_eq!(child.child_index(), i);
        }
    }

    #[test]
    fn extent_doubles_per_lod() {
        assert_eq!(ChunkKey::new(0, 0, 0, 0).extent_blocks(), 32);
        assert_eq!(ChunkKey::new(0, 0, 0, 3).extent_blocks(), 256);
    }
}
