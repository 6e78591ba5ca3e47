use std::ops::{Index, IndexMut};
use std::slice;

/// Dense three dimensional buffer stored row-major: the last axis (`depth`)
/// is contiguous, then `cols`, then `rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer3<T> {
    values: Vec<T>,
    rows: usize,
    cols: usize,
    depth: usize,
}

impl<T> Buffer3<T> {
    pub fn new(rows: usize, cols: usize, depth: usize, values: Vec<T>) -> Self {
        assert_eq!(
            values.len(),
            rows * cols * depth,
            "values length must equal rows * cols * depth"
        );
        Self {
            values,
            rows,
            cols,
            depth,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, k: usize) -> &T {
        debug_assert!(row < self.rows && col < self.cols && k < self.depth);
        &self.values[self.index(row, col, k)]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize, k: usize) -> &mut T {
        debug_assert!(row < self.rows && col < self.cols && k < self.depth);
        let idx = self.index(row, col, k);
        &mut self.values[idx]
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize, k: usize) -> usize {
        (row * self.cols + col) * self.depth + k
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.depth)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Contiguous run of `depth` values at `(row, col)`.
    #[inline]
    pub fn lane(&self, row: usize, col: usize) -> &[T] {
        let start = self.index(row, col, 0);
        &self.values[start..start + self.depth]
    }

    /// All `cols * depth` values belonging to one row.
    #[inline]
    pub fn plane(&self, row: usize) -> &[T] {
        let len = self.cols * self.depth;
        &self.values[row * len..(row + 1) * len]
    }

    #[inline]
    pub fn plane_mut(&mut self, row: usize) -> &mut [T] {
        let len = self.cols * self.depth;
        &mut self.values[row * len..(row + 1) * len]
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.values.iter()
    }
}

impl<T: Default + Clone> Buffer3<T> {
    pub fn new_default(rows: usize, cols: usize, depth: usize) -> Self {
        Self::new_filled(rows, cols, depth, T::default())
    }
}

impl<T: Clone> Buffer3<T> {
    pub fn new_filled(rows: usize, cols: usize, depth: usize, value: T) -> Self {
        Self {
            values: vec![value; rows * cols * depth],
            rows,
            cols,
            depth,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }
}

impl<T> Index<(usize, usize, usize)> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col, k): (usize, usize, usize)) -> &Self::Output {
        &self.values[(row * self.cols + col) * self.depth + k]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, (row, col, k): (usize, usize, usize)) -> &mut Self::Output {
        &mut self.values[(row * self.cols + col) * self.depth + k]
    }
}

impl<'a, T> IntoIterator for &'a Buffer3<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<T> From<Buffer3<T>> for Vec<T> {
    #[inline]
    fn from(buffer: Buffer3<T>) -> Self {
        buffer.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_dimensions() {
        let buf = Buffer3::new(2, 3, 4, (0..24).collect::<Vec<i32>>());
        assert_eq!(buf.dims(), (2, 3, 4));
        assert_eq!(buf.len(), 24);
        assert!(!buf.is_empty());
    }

    #[test]
    #[should_panic(expected = "values length must equal rows * cols * depth")]
    fn test_new_panics_on_size_mismatch() {
        Buffer3::new(2, 2, 2, vec![1, 2, 3]);
    }

    #[test]
    fn test_depth_is_contiguous() {
        // 2x2x3: (row, col, k) => (row * 2 + col) * 3 + k
        let buf = Buffer3::new(2, 2, 3, (0..12).collect::<Vec<i32>>());
        assert_eq!(*buf.get(0, 0, 2), 2);
        assert_eq!(*buf.get(0, 1, 0), 3);
        assert_eq!(*buf.get(1, 0, 0), 6);
        assert_eq!(buf[(1, 1, 2)], 11);
        assert_eq!(buf.lane(1, 0), &[6, 7, 8]);
        assert_eq!(buf.plane(1), &[6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_index_mut_tuple() {
        let mut buf = Buffer3::new_filled(2, 2, 2, 0u8);
        buf[(1, 0, 1)] = 7;
        *buf.get_mut(0, 1, 0) = 3;
        assert_eq!(buf[(1, 0, 1)], 7);
        assert_eq!(buf[(0, 1, 0)], 3);
        assert_eq!(buf.iter().map(|&v| v as u32).sum::<u32>(), 10);
    }

    #[test]
    fn test_plane_mut_writes_whole_row() {
        let mut buf = Buffer3::<f32>::new_default(3, 2, 2);
        buf.plane_mut(1).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buf[(1, 1, 1)], 4.0);
        assert_eq!(buf[(0, 0, 0)], 0.0);
        assert_eq!(buf[(2, 0, 0)], 0.0);
    }
}
