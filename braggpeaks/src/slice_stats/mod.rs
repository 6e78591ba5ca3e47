//! Iteratively refined statistics of one time-channel slice around a peak.
//!
//! Refinement is a fold over pure steps: [`SliceStatistics::refine_moments`]
//! re-estimates the local mean and standard deviation from a window sized by
//! the previous estimate, and after [`REFINE_ITERATIONS`] of those
//! [`SliceStatistics::partition`] splits a wider window into peak and
//! background pixels. The background-subtracted centroid and the signal
//! quality metrics are derived from the partition sums.
//!
//! Positions are bin indices: bin `i` has its centre at `i`.


use std::fmt;

use crate::volume::CountVolume;

/// Number of mean/standard-deviation re-estimation passes per slice.
pub const REFINE_ITERATIONS: usize = 7;

/// Window half-width used while the standard deviation is still below 1.
const MIN_HALF_WIDTH: f32 = 2.0;

/// Statistics for one channel slice. Standard deviations start at 1 and are
/// only ever replaced by estimates that are themselves at least 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceStatistics {
    pub channel: usize,
    pub row_mean: f32,
    pub col_mean: f32,
    pub row_std_dev: f32,
    pub col_std_dev: f32,
    /// Sum of counts in the last moment window.
    pub total_counts: f32,
    /// Largest count in the last moment window.
    pub ipk: f32,
    pub peak_num: usize,
    pub back_num: usize,
    pub peak_total: f32,
    pub back_total: f32,
    /// Sum of row positions of peak pixels.
    pub row_index_sum: f32,
    pub col_index_sum: f32,
    /// Sum of `row * count` over peak pixels.
    pub row_value_sum: f32,
    pub col_value_sum: f32,
}

impl SliceStatistics {
    /// Coarse starting guess: the given centre with unit standard deviations.
    pub fn initial(channel: usize, row_mean: f32, col_mean: f32) -> Self {
        Self {
            channel,
            row_mean,
            col_mean,
            row_std_dev: 1.0,
            col_std_dev: 1.0,
            total_counts: 0.0,
            ipk: 0.0,
            peak_num: 0,
            back_num: 0,
            peak_total: 0.0,
            back_total: 0.0,
            row_index_sum: 0.0,
            col_index_sum: 0.0,
            row_value_sum: 0.0,
            col_value_sum: 0.0,
        }
    }

    /// Run the full refinement for `channel` starting at `(row, col)`.
    pub fn refined(volume: &CountVolume, channel: usize, row: f32, col: f32) -> Self {
        Self::initial(channel, row, col).refine(volume)
    }

    /// [`REFINE_ITERATIONS`] moment passes followed by one partition pass.
    pub fn refine(self, volume: &CountVolume) -> Self {
        (0..REFINE_ITERATIONS)
            .fold(self, |stats, _| stats.refine_moments(volume))
            .partition(volume)
    }

    /// One re-estimation of mean and standard deviation.
    ///
    /// The window spans `max(2, 2σ)` bins either side of the current mean.
    /// An empty or zero-count window leaves mean and σ unchanged; rounding
    /// that makes `E[x²] < mean²` yields a zero estimate, which the σ ≥ 1
    /// clamp then ignores.
    pub fn refine_moments(self, volume: &CountVolume) -> Self {
        let mut next = self;

        let row_step = half_width(self.row_std_dev);
        let col_step = half_width(self.col_std_dev);
        let rows = window(self.row_mean, row_step, volume.rows());
        let cols = window(self.col_mean, col_step, volume.cols());

        let mut total = 0.0f64;
        let mut ipk = 0.0f32;
        let mut row_sum = 0.0f64;
        let mut col_sum = 0.0f64;
        let mut row_sum_2 = 0.0f64;
        let mut col_sum_2 = 0.0f64;

        if let (Some((row_0, row_1)), Some((col_0, col_1))) = (rows, cols) {
            for row in row_0..=row_1 {
                for col in col_0..=col_1 {
                    let value = volume.get(row, col, self.channel);
                    ipk = ipk.max(value);

                    let value = value as f64;
                    let row_prod = row as f64 * value;
                    let col_prod = col as f64 * value;

                    total += value;
                    row_sum += row_prod;
                    col_sum += col_prod;
                    row_sum_2 += row_prod * row as f64;
                    col_sum_2 += col_prod * col as f64;
                }
            }
        }

        next.total_counts = total as f32;
        next.ipk = ipk;

        if total != 0.0 {
            let row_mean = row_sum / total;
            let col_mean = col_sum / total;
            next.row_mean = row_mean as f32;
            next.col_mean = col_mean as f32;

            let row_std_dev = std_dev(row_sum_2 / total, row_mean);
            let col_std_dev = std_dev(col_sum_2 / total, col_mean);
            if row_std_dev >= 1.0 {
                next.row_std_dev = row_std_dev;
            }
            if col_std_dev >= 1.0 {
                next.col_std_dev = col_std_dev;
            }
        }

        next
    }

    /// Split the `2σ + 2` window into peak and background pixels.
    ///
    /// A pixel is peak if its squared distance from the mean is below
    /// `(2σ_row)² + (2σ_col)²`, otherwise background. Means and deviations
    /// are not changed.
    pub fn partition(self, volume: &CountVolume) -> Self {
        let mut next = self;

        let row_reach = 2.0 * self.row_std_dev;
        let col_reach = 2.0 * self.col_std_dev;
        let radius_sq = row_reach * row_reach + col_reach * col_reach;

        let mut peak_num = 0usize;
        let mut back_num = 0usize;
        let mut peak_total = 0.0f64;
        let mut back_total = 0.0f64;
        let mut row_index_sum = 0.0f64;
        let mut col_index_sum = 0.0f64;
        let mut row_value_sum = 0.0f64;
        let mut col_value_sum = 0.0f64;

        let rows = window(self.row_mean, row_reach + 2.0, volume.rows());
        let cols = window(self.col_mean, col_reach + 2.0, volume.cols());
        if let (Some((row_0, row_1)), Some((col_0, col_1))) = (rows, cols) {
            for row in row_0..=row_1 {
                for col in col_0..=col_1 {
                    let value = volume.get(row, col, self.channel) as f64;
                    let row_dist = row as f32 - self.row_mean;
                    let col_dist = col as f32 - self.col_mean;

                    if row_dist * row_dist + col_dist * col_dist >= radius_sq {
                        back_total += value;
                        back_num += 1;
                    } else {
                        peak_total += value;
                        peak_num += 1;
                        row_index_sum += row as f64;
                        col_index_sum += col as f64;
                        row_value_sum += row as f64 * value;
                        col_value_sum += col as f64 * value;
                    }
                }
            }
        }

        next.peak_num = peak_num;
        next.back_num = back_num;
        next.peak_total = peak_total as f32;
        next.back_total = back_total as f32;
        next.row_index_sum = row_index_sum as f32;
        next.col_index_sum = col_index_sum as f32;
        next.row_value_sum = row_value_sum as f32;
        next.col_value_sum = col_value_sum as f32;
        next
    }

    /// Background-subtracted row centroid, NaN if undefined.
    pub fn row_centroid(&self) -> f32 {
        self.centroid(self.row_value_sum, self.row_index_sum)
    }

    /// Background-subtracted column centroid, NaN if undefined.
    pub fn col_centroid(&self) -> f32 {
        self.centroid(self.col_value_sum, self.col_index_sum)
    }

    /// `(value_sum − index_sum·b) / (peak_total − peak_num·b)` with `b` the
    /// average background. NaN without background pixels or when the net
    /// peak signal is not positive.
    fn centroid(&self, value_sum: f32, index_sum: f32) -> f32 {
        if self.back_num == 0 {
            return f32::NAN;
        }
        let ave_back = self.back_total / self.back_num as f32;
        let weighted_sum = value_sum - index_sum * ave_back;
        let net_peak_count = self.peak_total - self.peak_num as f32 * ave_back;
        if net_peak_count > 0.0 {
            weighted_sum / net_peak_count
        } else {
            f32::NAN
        }
    }

    /// Average count of peak pixels, 0 without peak pixels.
    pub fn peak_average(&self) -> f32 {
        if self.peak_num == 0 {
            0.0
        } else {
            self.peak_total / self.peak_num as f32
        }
    }

    /// Average count of background pixels, 0 without background pixels.
    pub fn background_average(&self) -> f32 {
        if self.back_num == 0 {
            0.0
        } else {
            self.back_total / self.back_num as f32
        }
    }

    /// `(peak_ave − back_ave) / back_ave`, 0 when the background average is not positive.
    pub fn signal_to_noise(&self) -> f32 {
        let back_ave = self.background_average();
        if back_ave > 0.0 {
            (self.peak_average() - back_ave) / back_ave
        } else {
            0.0
        }
    }

    /// `peak_ave − back_ave`.
    pub fn signal(&self) -> f32 {
        self.peak_average() - self.background_average()
    }

    /// Net peak intensity over its Poisson uncertainty, 0 without background pixels.
    pub fn i_over_sigma(&self) -> f32 {
        if self.back_num == 0 {
            return 0.0;
        }
        let signal = self.peak_total - self.peak_num as f32 * self.back_total / self.back_num as f32;
        let ratio = self.peak_num as f32 / self.back_num as f32;
        let sigma_signal = (self.peak_total + ratio * ratio * self.back_total).sqrt();
        signal / sigma_signal
    }

    /// Column titles matching the [`fmt::Display`] rows.
    pub fn header() -> String {
        format!(
            "{:>8}  {:>8}  {:>4}  {:>5}  {:>5}  {:>5}  {:>7}  {:>8}  {:>8}   {:>3} {:>8}  {:>3} {:>7} {:>8} {:>8}",
            "Col",
            "Row",
            "Chan",
            "C Sig",
            "R Sig",
            "IPK",
            "Total",
            "C Ctroid",
            "R Ctroid",
            "NPk",
            "PkAve",
            "NBk",
            "BkAve",
            "Sig/Noi",
            "IsigI"
        )
    }

    /// Position, spread and window totals only, as traced between iterations.
    pub fn partial_row(&self) -> String {
        format!(
            "{:8.3}  {:8.3}  {:4}  {:5.2}  {:5.2}  {:5.0}  {:7.0}",
            self.col_mean,
            self.row_mean,
            self.channel,
            self.col_std_dev,
            self.row_std_dev,
            self.ipk,
            self.total_counts
        )
    }
}

impl fmt::Display for SliceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:8.3}  {:8.3}   {:3} {:8.2}  {:3} {:7.2} {:8.2} {:8.2}",
            self.partial_row(),
            self.col_centroid(),
            self.row_centroid(),
            self.peak_num,
            self.peak_average(),
            self.back_num,
            self.background_average(),
            self.signal_to_noise(),
            self.i_over_sigma()
        )
    }
}

#[inline]
fn half_width(std_dev: f32) -> f32 {
    if std_dev >= 1.0 {
        2.0 * std_dev
    } else {
        MIN_HALF_WIDTH
    }
}

/// Nearest bin index to a position.
#[inline]
fn nearest_bin(position: f32) -> i64 {
    (position + 0.5).floor() as i64
}

/// Inclusive bin range `center ± half_width`, clamped to `0..len`.
/// `None` if the range misses the axis entirely.
fn window(center: f32, half_width: f32, len: usize) -> Option<(usize, usize)> {
    let lo = nearest_bin(center - half_width).max(0);
    let hi = nearest_bin(center + half_width).min(len as i64 - 1);
    (lo <= hi).then(|| (lo as usize, hi as usize))
}

#[inline]
fn std_dev(second_moment: f64, mean: f64) -> f32 {
    let variance = second_moment - mean * mean;
    if variance >= 0.0 {
        variance.sqrt() as f32
    } else {
        0.0
    }
}
