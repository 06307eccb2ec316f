//! Pseudo-chunk data: a per-chunk digest of visible cube faces used to
//! render lower-LOD approximations of terrain, grounded on
//! `original_source/include/voxen/land/pseudo_chunk_data.hpp`.
//!
//! At LOD0 this is built by scanning a chunk's 34³ expanded neighbourhood
//! (the chunk plus a 1-voxel halo on every side) for solid/air transitions.
//! At LODn>0 it is built by aggregating 8 LOD(n-1) pseudo-chunks, halving
//! their face coordinates and averaging colors per `(cell, orientation)`.

use super::cube_array::CubeArrayView;
use crate::util::error::GfxError;

/// One of the 6 axis-aligned cube face orientations. Order matches
/// [`FACE_NORMAL`] and the face-corner offset tables used by the surface
/// builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Orientation {
    PlusX = 0,
    MinusX = 1,
    PlusY = 2,
    MinusY = 3,
    PlusZ = 4,
    MinusZ = 5,
}

pub const FACE_NORMAL: [(i8, i8, i8); 6] =
    [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];

const ORIENTATIONS: [Orientation; 6] = [
    Orientation::PlusX,
    Orientation::MinusX,
    Orientation::PlusY,
    Orientation::MinusY,
    Orientation::PlusZ,
    Orientation::MinusZ,
];

/// A single visible cube face: cell coordinates in `[0,32)` packed at 5 bits
/// each, an orientation, flags, and an sRGB color. 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub orientation: Orientation,
    pub flags: u8,
    pub color_srgb: u32,
}

impl Face {
    pub fn new(x: u8, y: u8, z: u8, orientation: Orientation, flags: u8, color_srgb: u32) -> Self {
        debug_assert!(x < 32 && y < 32 && z < 32);
        Self { x, y, z, orientation, flags, color_srgb }
    }

    /// Vertex-keying cell id used by the surface builder: `(x<<14)+(y<<7)+z`.
    pub fn cell_key(&self) -> u32 {
        ((self.x as u32) << 14) + ((self.y as u32) << 7) + self.z as u32
    }
}

/// Per-chunk list of visible faces, the unit of data the surface builder
/// consumes and the generator produces.
#[derive(Debug, Clone, Default)]
pub struct PseudoChunkData {
    pub faces: Vec<Face>,
}

impl PseudoChunkData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds LOD0 pseudo-chunk data by scanning a 34³ expanded
    /// neighbourhood (`halo` wraps the chunk's 32³ body with a 1-voxel
    /// border on every side) for solid/air transitions. `is_solid`/`color_of`
    /// classify a raw block id.
    pub fn from_expanded_neighbourhood(
        halo: CubeArrayView<'_, u16>,
        is_solid: impl Fn(u16) -> bool,
        color_of: impl Fn(u16) -> u32,
    ) -> Self {
        assert_eq!(halo.side(), 34, "expanded neighbourhood must be chunk size + 1 voxel halo each side");
        let mut faces = Vec::new();
        for y in 0..32usize {
            for x in 0..32usize {
                for z in 0..32usize {
                    // Halo indices are offset by 1 relative to chunk-local coordinates.
                    let id = halo.get(y + 1, x + 1, z + 1);
                    if !is_solid(id) {
                        continue;
                    }
                    let color = color_of(id);
                    for orientation in ORIENTATIONS {
                        let (dx, dy, dz) = FACE_NORMAL[orientation as usize];
                        let (ny, nx, nz) = (
                            (y as i64 + 1 + dy as i64) as usize,
                            (x as i64 + 1 + dx as i64) as usize,
                            (z as i64 + 1 + dz as i64) as usize,
                        );
                        let neighbour = halo.get(ny, nx, nz);
                        if !is_solid(neighbour) {
                            faces.push(Face::new(x as u8, y as u8, z as u8, orientation, 0, color));
                        }
                    }
                }
            }
        }
        Self { faces }
    }

    /// Aggregates 8 LOD(n-1) children (YXZ cube order, matching
    /// [`super::key::ChunkKey::children`]) into one LOD(n) pseudo-chunk.
    /// Child face coordinates are halved; faces landing on the same
    /// `(cell, orientation)` have their colors averaged by a weighted RGBA
    /// sum divided by the accumulated alpha.
    pub fn aggregate_children(children: &[PseudoChunkData; 8]) -> Self {
        use std::collections::HashMap;

        // (halved x, y, z, orientation) -> (r, g, b, a) accumulator, weight count.
        let mut acc: HashMap<(u8, u8, u8, u8), (u64, u64, u64, u64, u32)> = HashMap::new();

        for (child_index, child) in children.iter().enumerate() {
            let (oy, ox, oz) = child_offset(child_index);
            for face in &child.faces {
                let hx = face.x / 2 + ox * 16;
                let hy = face.y / 2 + oy * 16;
                let hz = face.z / 2 + oz * 16;
                let (r, g, b, a) = unpack_srgb(face.color_srgb);
                let entry = acc.entry((hx, hy, hz, face.orientation as u8)).or_insert((0, 0, 0, 0, 0));
                entry.0 += r as u64 * a as u64;
                entry.1 += g as u64 * a as u64;
                entry.2 += b as u64 * a as u64;
                entry.3 += a as u64;
                entry.4 += 1;
            }
        }

        let mut faces = Vec::with_capacity(acc.len());
        for ((x, y, z, orientation_index), (r, g, b, a, _)) in acc {
            let orientation = ORIENTATIONS[orientation_index as usize];
            let color = if a == 0 {
                0
            } else {
                pack_srgb((r / a) as u8, (g / a) as u8, (b / a) as u8, (a / 8).min(255) as u8)
            };
            faces.push(Face::new(x, y, z, orientation, 0, color));
        }
        Self { faces }
    }
}

/// YXZ child offset (0 or 1 per axis), matching [`super::key::ChunkKey::children`]'s
/// emission order.
fn child_offset(index: usize) -> (u8, u8, u8) {
    let dy = (index / 4) as u8;
    let dx = ((index / 2) % 2) as u8;
    let dz = (index % 2) as u8;
    (dy, dx, dz)
}

fn unpack_srgb(color: u32) -> (u8, u8, u8, u8) {
    ((color >> 24) as u8, (color >> 16) as u8, (color >> 8) as u8, color as u8)
}

fn pack_srgb(r: u8, g: u8, b: u8, a: u8) -> u32 {
    ((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32
}

pub fn check_face_budget(count: usize, limit: usize) -> Result<(), GfxError> {
    if count > limit {
        return Err(GfxError::DataTooLarge { what: "pseudo-chunk faces", actual: count, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::land::cube_array::CubeArray;

    #[test]
    fn solid_block_surrounded_by_air_has_six_visible_faces() {
        let mut halo: CubeArray<u16, 34> = CubeArray::filled(0);
        halo.set(1, 1, 1, 7);
        let data = PseudoChunkData::from_expanded_neighbourhood(halo.view(), |id| id != 0, |_| pack_srgb(255, 0, 0, 255));
        assert_eq!(data.faces.len(), 6);
        assert_eq!(data.faces[0].x, 0);
        assert_eq!(data.faces[0].y, 0);
        assert_eq!(data.faces[0].z, 0);
    }

    #[test]
    fn solid_block_surrounded_by_solid_has_no_visible_faces() {
        let halo: CubeArray<u16, 34> = CubeArray::filled(7);
        let data = PseudoChunkData::from_expanded_neighbourhood(halo.view(), |id| id != 0, |_| 0);
        assert!(data.faces.is_empty());
    }

    #[test]
    fn aggregate_children_halves_coordinates_and_merges_colors() {
        let mut children: [PseudoChunkData; 8] = std::array::from_fn(|_| PseudoChunkData::new());
        children[0].faces.push(Face::new(2, 2, 2, Orientation::PlusY, 0, pack_srgb(100, 0, 0, 255)));

        let aggregated = PseudoChunkData::aggregate_children(&children);
        assert_eq!(aggregated.faces.len(), 1);
        let face = aggregated.faces[0];
        assert_eq!((face.x, face.y, face.z), (1, 1, 1));
        assert_eq!(face.orientation, Orientation::PlusY);
    }
}
