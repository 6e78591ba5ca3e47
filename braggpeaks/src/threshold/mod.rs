//! Adaptive intensity threshold from the histogram of a count volume.
//!
//! Counts are truncated to integers and binned into a caller-sized histogram
//! (values past the end land in the last bin, negatives in bin 0). The
//! cumulative distribution then picks the threshold:
//!
//! 1. **Auto-selection** (requested threshold ≤ 0): the smallest value `v`
//!    with `cdf[v] ≥ 0.999 × bins`, so at most 0.1% of bins stay candidates.
//! 2. **Safety raise**: whatever its origin, the threshold is raised while
//!    `cdf[t] < 0.99 × bins`, so no more than 1% of bins are ever scanned.
//! 3. **Range/empty lowering**: a threshold past the histogram is pulled back
//!    to the last bin, then lowered while no bin would remain above it.
//! 4. **Floor**: at least 3 for raw counts, 5 for smoothed counts.
//!
//! Every loop walks the histogram at most once, so degenerate distributions
//! (all mass in one bin) terminate.


use crate::volume::CountVolume;

/// Histogram size used when the caller does not choose one.
pub const DEFAULT_HISTOGRAM_BINS: usize = 10_000;

/// Fraction of bins that must lie at or below an auto-selected threshold.
pub const CANDIDATE_FRACTION: f64 = 0.999;

/// Fraction of bins that must lie at or below any final threshold before
/// range lowering.
pub const SAFETY_FRACTION: f64 = 0.99;

/// Minimum threshold for raw counts.
pub const RAW_THRESHOLD_FLOOR: usize = 3;

/// Minimum threshold for smoothed counts. A 3×3 sum inflates counts roughly
/// nine-fold, so the raw floor would admit noise.
pub const SMOOTHED_THRESHOLD_FLOOR: usize = 5;

/// Integer count used for histogramming and threshold comparisons.
///
/// Truncates toward zero; NaN maps to 0 and out-of-range values saturate.
#[inline]
pub fn truncated_count(value: f32) -> i64 {
    value as i64
}

#[inline]
fn histogram_index(value: f32, len: usize) -> usize {
    let v = truncated_count(value);
    if v < 0 {
        0
    } else if v as u64 >= len as u64 {
        len - 1
    } else {
        v as usize
    }
}

/// Outcome of [`HistogramThresholder::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSelection {
    /// Threshold after every adjustment; candidates must exceed it.
    pub threshold: usize,
    /// Auto-selected value before adjustments, if auto-selection ran.
    pub computed: Option<usize>,
}

/// Cumulative distribution of truncated counts over a whole volume.
#[derive(Debug, Clone)]
pub struct HistogramThresholder {
    /// `cdf[v]` = number of bins with truncated count ≤ `v`.
    cdf: Vec<u64>,
    total_bins: u64,
}

impl HistogramThresholder {
    /// Fill `histogram` with the counts of every bin of `volume` and build
    /// the cumulative distribution. Previous histogram contents are cleared.
    ///
    /// # Panics
    /// If `histogram` is empty.
    pub fn from_volume(volume: &CountVolume, histogram: &mut [u32]) -> Self {
        assert!(!histogram.is_empty(), "histogram must have at least one bin");

        histogram.fill(0);
        let len = histogram.len();
        for &value in volume.values() {
            histogram[histogram_index(value, len)] += 1;
        }

        Self::from_histogram(histogram)
    }

    /// Build the cumulative distribution of an already filled histogram.
    pub fn from_histogram(histogram: &[u32]) -> Self {
        let mut cdf = Vec::with_capacity(histogram.len());
        let mut running = 0u64;
        for &count in histogram {
            running += count as u64;
            cdf.push(running);
        }
        Self {
            cdf,
            total_bins: running,
        }
    }

    #[inline]
    pub fn cdf(&self) -> &[u64] {
        &self.cdf
    }

    #[inline]
    pub fn total_bins(&self) -> u64 {
        self.total_bins
    }

    /// Number of bins whose truncated count exceeds `threshold`.
    pub fn bins_above(&self, threshold: usize) -> u64 {
        match self.cdf.get(threshold) {
            Some(&at_or_below) => self.total_bins - at_or_below,
            None => 0,
        }
    }

    /// Smallest `v` with `cdf[v] ≥ 0.999 × total_bins`.
    pub fn auto_threshold(&self) -> usize {
        let cutoff = self.total_bins as f64 * CANDIDATE_FRACTION;
        self.cdf
            .iter()
            .position(|&c| c as f64 >= cutoff)
            .unwrap_or(self.cdf.len().saturating_sub(1))
    }

    /// Raise `threshold` until at most 1% of bins lie above it, stopping at
    /// the end of the histogram.
    pub fn raise_to_safety_cap(&self, mut threshold: usize) -> usize {
        let cutoff = self.total_bins as f64 * SAFETY_FRACTION;
        while threshold < self.cdf.len() && (self.cdf[threshold] as f64) < cutoff {
            threshold += 1;
        }
        threshold
    }

    /// Choose the final threshold.
    ///
    /// `requested ≤ 0` asks for auto-selection; `floor` is
    /// [`RAW_THRESHOLD_FLOOR`] or [`SMOOTHED_THRESHOLD_FLOOR`].
    pub fn select(&self, requested: i32, floor: usize) -> ThresholdSelection {
        let computed = (requested <= 0).then(|| self.auto_threshold());
        let start = computed.unwrap_or(requested.max(0) as usize);

        let mut threshold = self.raise_to_safety_cap(start);

        let last = self.cdf.len().saturating_sub(1);
        if threshold > last {
            threshold = last;
        }
        while threshold > 0 && self.cdf[threshold] >= self.total_bins {
            threshold -= 1;
        }

        ThresholdSelection {
            threshold: threshold.max(floor),
            computed,
        }
    }
}
