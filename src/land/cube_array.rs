//! Dense `N*N*N` voxel array with YXZ indexing and a strided view type,
//! grounded on `original_source/include/voxen/land/cube_array.hpp`.
//!
//! Index order is YXZ: `data[y][x][z]`, i.e. `z` is contiguous. `CubeArray`
//! owns its storage; `CubeArrayView`/`CubeArrayViewMut` borrow a slice plus
//! strides, letting [`CompressedChunkStorage::expand`](super::compressed_chunk_storage)
//! and subchunk extraction operate on sub-regions without copying.

/// Owned `N*N*N` dense array, YXZ order.
#[derive(Debug, Clone)]
pub struct CubeArray<T, const N: usize> {
    data: Vec<T>,
}

impl<T: Copy + Default, const N: usize> Default for CubeArray<T, N> {
    fn default() -> Self {
        Self::filled(T::default())
    }
}

impl<T: Copy, const N: usize> CubeArray<T, N> {
    pub fn filled(value: T) -> Self {
        Self { data: vec![value; N * N * N] }
    }

    #[inline]
    fn index(y: usize, x: usize, z: usize) -> usize {
        debug_assert!(y < N && x < N && z < N);
        (y * N + x) * N + z
    }

    pub fn get(&self, y: usize, x: usize, z: usize) -> T {
        self.data[Self::index(y, x, z)]
    }

    pub fn set(&mut self, y: usize, x: usize, z: usize, value: T) {
        let idx = Self::index(y, x, z);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn view(&self) -> CubeArrayView<'_, T> {
        CubeArrayView { data: &self.data, side: N, stride_y: N * N, stride_x: N }
    }

    pub fn view_mut(&mut self) -> CubeArrayViewMut<'_, T> {
        CubeArrayViewMut { data: &mut self.data, side: N, stride_y: N * N, stride_x: N }
    }
}

/// Read-only strided view into a (possibly larger) YXZ-ordered buffer.
pub struct CubeArrayView<'a, T> {
    data: &'a [T],
    side: usize,
    stride_y: usize,
    stride_x: usize,
}

impl<'a, T: Copy> CubeArrayView<'a, T> {
    pub fn side(&self) -> usize {
        self.side
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, z: usize) -> T {
        self.data[y * self.stride_y + x * self.stride_x + z]
    }

    /// A sub-cube view of side `sub_side` starting at `(oy, ox, oz)` within
    /// this view's coordinate space.
    pub fn subview(&self, oy: usize, ox: usize, oz: usize, sub_side: usize) -> CubeArrayView<'a, T> {
        assert!(oy + sub_side <= self.side && ox + sub_side <= self.side && oz + sub_side <= self.side);
        let start = oy * self.stride_y + ox * self.stride_x + oz;
        CubeArrayView { data: &self.data[start..], side: sub_side, stride_y: self.stride_y, stride_x: self.stride_x }
    }

    pub fn is_uniform(&self) -> bool
    where
        T: PartialEq,
    {
        let first = self.get(0, 0, 0);
        for y in 0..self.side {
            for x in 0..self.side {
                for z in 0..self.side {
                    if self.get(y, x, z) != first {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub fn copy_into<const N: usize>(&self, dest: &mut CubeArray<T, N>) {
        assert_eq!(self.side, N);
        for y in 0..N {
            for x in 0..N {
                for z in 0..N {
                    dest.set(y, x, z, self.get(y, x, z));
                }
            }
        }
    }
}

/// Mutable strided view, used by [`CompressedChunkStorage::expand`](super::compressed_chunk_storage).
pub struct CubeArrayViewMut<'a, T> {
    data: &'a mut [T],
    side: usize,
    stride_y: usize,
    stride_x: usize,
}

impl<'a, T: Copy> CubeArrayViewMut<'a, T> {
    pub fn side(&self) -> usize {
        self.side
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, z: usize, value: T) {
        self.data[y * self.stride_y + x * self.stride_x + z] = value;
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, z: usize) -> T {
        self.data[y * self.stride_y + x * self.stride_x + z]
    }

    pub fn fill(&mut self, value: T) {
        for y in 0..self.side {
            for x in 0..self.side {
                for z in 0..self.side {
                    self.set(y, x, z, value);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, oy: usize, ox: usize, oz: usize, side: usize, value: T) {
        for y in oy..oy + side {
            for x in ox..ox + side {
                for z in oz..oz + side {
                    self.set(y, x, z, value);
                }
            }
        }
    }

    pub fn subview_mut(&mut self, oy: usize, ox: usize, oz: usize, sub_side: usize) -> CubeArrayViewMut<'_, T> {
        assert!(oy + sub_side <= self.side && ox + sub_side <= self.side && oz + sub_side <= self.side);
        let start = oy * self.stride_y + ox * self.stride_x + oz;
        CubeArrayViewMut { data: &mut self.data[start..], side: sub_side, stride_y: self.stride_y, stride_x: self.stride_x }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut arr: CubeArray<u16, 4> = CubeArray::filled(0);
        arr.set(1, 2, 3, 42);
        assert_eq!(arr.get(1, 2, 3), 42);
        assert_eq!(arr.get(0, 0, 0), 0);
    }

    #[test]
    fn subview_reads_correct_offset() {
        let mut arr: CubeArray<u8, 4> = CubeArray::filled(0);
        arr.set(2, 2, 2, 9);
        let view = arr.view();
        let sub = view.subview(2, 2, 2, 2);
        assert_eq!(sub.get(0, 0, 0), 9);
    }

    #[test]
    fn is_uniform_detects_constant_region() {
        let arr: CubeArray<u8, 4> = CubeArray::filled(7);
        assert!(arr.view().is_uniform());
    }

    #[test]
    fn fill_rect_only_touches_the_requested_region() {
        let mut arr: CubeArray<u8, 4> = CubeArray::filled(0);
        arr.view_mut().fill_rect(0, 0, 0, 2, 5);
        assert_eq!(arr.get(0, 0, 0), 5);
        assert_eq!(arr.get(1, 1, 1), 5);
        assert_eq!(arr.get(2, 2, 2), 0);
    }
}
