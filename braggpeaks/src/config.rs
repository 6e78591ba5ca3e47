//! Search configuration and scan region.

use serde::{Deserialize, Serialize};

use crate::threshold::DEFAULT_HISTOGRAM_BINS;
use crate::volume::CountVolume;

// ============================================================================
// Smoothing
// ============================================================================

/// Optional 3×3 neighbourhood-sum pre-filter, and who owns its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    /// Search the counts as given.
    #[default]
    None,
    /// Smooth into freshly allocated storage; the input is left untouched.
    Copy,
    /// Smooth an owned volume in its own storage. A borrowed volume cannot
    /// be consumed and is copied instead.
    InPlace,
}

impl Smoothing {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self != Smoothing::None
    }
}

// ============================================================================
// PeakSearchConfig
// ============================================================================

/// Parameters of one peak search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSearchConfig {
    pub smoothing: Smoothing,
    /// Stop after this many accepted peaks.
    pub num_requested: usize,
    /// Minimum count a candidate bin must exceed. Zero or negative selects
    /// the threshold from the count histogram.
    pub threshold: i32,
    /// Number of histogram bins; counts past the last bin are clamped into it.
    pub histogram_bins: usize,
}

impl Default for PeakSearchConfig {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::None,
            num_requested: 30,
            threshold: 0,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

impl PeakSearchConfig {
    pub fn validate(&self) {
        assert!(
            self.histogram_bins > 0,
            "histogram_bins must be positive, got {}",
            self.histogram_bins
        );
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

// ============================================================================
// ScanRegion
// ============================================================================

/// Detector rows, columns and channels the search may start candidates in.
///
/// Row and column numbers are 1-based, following the detector-grid
/// convention; numbers outside the volume are skipped. The whole volume is
/// still histogrammed and used for refinement, only candidate seeds are
/// restricted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRegion {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    /// First channel scanned, 0-based. Past the last channel it resets to 0.
    pub min_chan: usize,
    /// Last channel scanned, 0-based. Past the last channel it resets to the
    /// last channel.
    pub max_chan: usize,
}

impl ScanRegion {
    pub fn new(rows: Vec<usize>, cols: Vec<usize>, min_chan: usize, max_chan: usize) -> Self {
        Self {
            rows,
            cols,
            min_chan,
            max_chan,
        }
    }

    /// Every row, column and channel of `volume`.
    pub fn full(volume: &CountVolume) -> Self {
        Self {
            rows: (1..=volume.rows()).collect(),
            cols: (1..=volume.cols()).collect(),
            min_chan: 0,
            max_chan: volume.channels() - 1,
        }
    }

    /// Translate to 0-based indices valid for `volume`.
    pub fn resolve(&self, volume: &CountVolume) -> ResolvedRegion {
        let last_chan = volume.channels() - 1;
        ResolvedRegion {
            rows: to_indices(&self.rows, volume.rows()),
            cols: to_indices(&self.cols, volume.cols()),
            min_chan: if self.min_chan > last_chan { 0 } else { self.min_chan },
            max_chan: self.max_chan.min(last_chan),
        }
    }
}

/// A [`ScanRegion`] checked against a particular volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegion {
    /// 0-based row indices, in the order given.
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub min_chan: usize,
    pub max_chan: usize,
}

impl ResolvedRegion {
    /// Number of bins the region covers; empty if `min_chan > max_chan`.
    pub fn num_bins(&self) -> usize {
        let chans = (self.max_chan + 1).saturating_sub(self.min_chan);
        self.rows.len() * self.cols.len() * chans
    }
}

fn to_indices(numbers: &[usize], len: usize) -> Vec<usize> {
    numbers
        .iter()
        .filter(|&&n| (1..=len).contains(&n))
        .map(|&n| n - 1)
        .collect()
}
