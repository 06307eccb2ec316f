//! Land subsystem (component group H-K): compressed chunk storage, the
//! hierarchical COW storage tree, pseudo-chunk surface aggregation, async
//! generation, and LOD control. Grounded on `original_source/include/voxen/land/*`.

pub mod compressed_chunk_storage;
pub mod controller;
pub mod cube_array;
pub mod generator;
pub mod key;
pub mod pseudo_chunk_data;
pub mod pseudo_chunk_surface;
pub mod seam;
pub mod storage_tree;
pub mod typed_storage_tree;

pub use compressed_chunk_storage::CompressedChunkStorage;
pub use controller::LandController;
pub use cube_array::{CubeArray, CubeArrayView, CubeArrayViewMut};
pub use generator::LandGenerator;
pub use key::ChunkKey;
pub use pseudo_chunk_data::{Face, Orientation, PseudoChunkData};
pub use pseudo_chunk_surface::{build_surface, PackedVertex};
pub use storage_tree::StorageTree;
pub use typed_storage_tree::TypedStorageTree;

/// LOD0 block storage: a chunk is a compressed `32^3` array of block ids.
pub type Chunk = CompressedChunkStorage<u16>;
