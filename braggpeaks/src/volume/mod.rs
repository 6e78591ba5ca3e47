//! Dense count volume indexed by (detector row, detector column, time channel).
//!
//! The volume is owned by the caller. The only transform this crate applies
//! is the optional 3×3 per-slice smoothing, offered in two explicit forms:
//! [`CountVolume::smoothed`] allocates new storage and leaves the input alone,
//! [`CountVolume::into_smoothed`] consumes the volume and reuses its storage.


use std::ops::{Index, IndexMut};

use common::Buffer3;

use crate::error::FindPeaksError;

/// Three dimensional histogram of counts, `[row][col][channel]`, channel contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct CountVolume {
    counts: Buffer3<f32>,
}

impl CountVolume {
    /// Wrap a flat `[row][col][channel]` array.
    pub fn new(
        rows: usize,
        cols: usize,
        channels: usize,
        counts: Vec<f32>,
    ) -> Result<Self, FindPeaksError> {
        check_dims(rows, cols, channels)?;
        let expected = rows * cols * channels;
        if counts.len() != expected {
            return Err(FindPeaksError::DataLength {
                expected,
                actual: counts.len(),
            });
        }
        Ok(Self {
            counts: Buffer3::new(rows, cols, channels, counts),
        })
    }

    /// A volume with every bin set to `value`.
    pub fn filled(
        rows: usize,
        cols: usize,
        channels: usize,
        value: f32,
    ) -> Result<Self, FindPeaksError> {
        check_dims(rows, cols, channels)?;
        Ok(Self {
            counts: Buffer3::new_filled(rows, cols, channels, value),
        })
    }

    /// Build from nested `[row][col][channel]` vectors, rejecting ragged input.
    pub fn from_nested(data: &[Vec<Vec<f32>>]) -> Result<Self, FindPeaksError> {
        let rows = data.len();
        let cols = data.first().map_or(0, Vec::len);
        let channels = data
            .first()
            .and_then(|row| row.first())
            .map_or(0, Vec::len);
        check_dims(rows, cols, channels)?;

        let mut counts = Vec::with_capacity(rows * cols * channels);
        for (row, row_data) in data.iter().enumerate() {
            if row_data.len() != cols {
                return Err(FindPeaksError::RaggedRows { row });
            }
            for (col, lane) in row_data.iter().enumerate() {
                if lane.len() != channels {
                    return Err(FindPeaksError::RaggedColumns { row, col });
                }
                counts.extend_from_slice(lane);
            }
        }

        Ok(Self {
            counts: Buffer3::new(rows, cols, channels, counts),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.counts.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.counts.cols()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.counts.depth()
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, chan: usize) -> f32 {
        *self.counts.get(row, col, chan)
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        self.counts.values()
    }

    #[inline]
    pub fn as_buffer(&self) -> &Buffer3<f32> {
        &self.counts
    }

    /// Smoothed copy; `self` is left untouched.
    ///
    /// Each bin is replaced by the sum of its 3×3 row/column neighbourhood on
    /// the same channel. Windows clipped by the volume edge are scaled by
    /// `9 / n_pixels` so border bins are on the same scale as interior ones.
    pub fn smoothed(&self) -> CountVolume {
        let (rows, cols, channels) = self.counts.dims();
        let mut out = Buffer3::new_default(rows, cols, channels);
        for row in 0..rows {
            smooth_row(&self.counts, row, out.plane_mut(row));
        }
        CountVolume { counts: out }
    }

    /// Smooth in place, consuming the volume.
    ///
    /// Produces the same values as [`CountVolume::smoothed`] while only
    /// allocating two rows of scratch: a row is written back one step late,
    /// once the next row no longer needs its original counts.
    pub fn into_smoothed(mut self) -> CountVolume {
        let rows = self.counts.rows();
        let plane_len = self.counts.cols() * self.counts.depth();
        let mut prev = vec![0.0f32; plane_len];
        let mut current = vec![0.0f32; plane_len];

        for row in 0..rows {
            smooth_row(&self.counts, row, &mut current);
            if row > 0 {
                self.counts.plane_mut(row - 1).copy_from_slice(&prev);
            }
            std::mem::swap(&mut prev, &mut current);
        }
        self.counts.plane_mut(rows - 1).copy_from_slice(&prev);

        self
    }
}

impl Index<(usize, usize, usize)> for CountVolume {
    type Output = f32;

    #[inline]
    fn index(&self, idx: (usize, usize, usize)) -> &Self::Output {
        &self.counts[idx]
    }
}

impl IndexMut<(usize, usize, usize)> for CountVolume {
    #[inline]
    fn index_mut(&mut self, idx: (usize, usize, usize)) -> &mut Self::Output {
        &mut self.counts[idx]
    }
}

fn check_dims(rows: usize, cols: usize, channels: usize) -> Result<(), FindPeaksError> {
    if rows == 0 {
        Err(FindPeaksError::ZeroRows)
    } else if cols == 0 {
        Err(FindPeaksError::ZeroColumns)
    } else if channels == 0 {
        Err(FindPeaksError::ZeroChannels)
    } else {
        Ok(())
    }
}

/// Write the smoothed values of one row (`cols * channels`) into `out`.
fn smooth_row(src: &Buffer3<f32>, row: usize, out: &mut [f32]) {
    let (rows, cols, channels) = src.dims();
    debug_assert_eq!(out.len(), cols * channels);

    let row_0 = row.saturating_sub(1);
    let row_1 = (row + 1).min(rows - 1);
    for col in 0..cols {
        let col_0 = col.saturating_sub(1);
        let col_1 = (col + 1).min(cols - 1);

        let sums = &mut out[col * channels..(col + 1) * channels];
        sums.fill(0.0);
        for rr in row_0..=row_1 {
            for cc in col_0..=col_1 {
                for (sum, &value) in sums.iter_mut().zip(src.lane(rr, cc)) {
                    *sum += value;
                }
            }
        }

        let n_pix = (row_1 - row_0 + 1) * (col_1 - col_0 + 1);
        let scale = 9.0 / n_pix as f32;
        sums.iter_mut().for_each(|sum| *sum *= scale);
    }
}
