//! Greedy local-maximum peak search over a count volume.
//!
//! # Algorithm Overview
//!
//! 1. **Smoothing** (optional): 3×3 neighbourhood sum per channel slice.
//!
//! 2. **Threshold**: histogram every bin of the volume and choose the count a
//!    candidate must exceed (see [`crate::threshold`]).
//!
//! 3. **Collection**: every bin of the scan region above threshold becomes a
//!    [`PeakBin`]; the list is sorted so the largest counts come first.
//!
//! 4. **Acceptance**: walking from the largest count down, a bin is discarded
//!    if it lies inside an accepted peak, if a bin within ±3 on any axis holds
//!    a larger count, if refinement fails, or if the refined peak overlaps an
//!    accepted one. Survivors are accepted in discovery order until enough
//!    peaks are found.


use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

use crate::config::{PeakSearchConfig, ResolvedRegion, ScanRegion, Smoothing};
use crate::error::FindPeaksError;
use crate::log::PeakLog;
use crate::peak::{PeakBin, PeakCandidate};
use crate::threshold::{
    HistogramThresholder, RAW_THRESHOLD_FLOOR, SMOOTHED_THRESHOLD_FLOOR, truncated_count,
};
use crate::volume::CountVolume;

/// Half-width of the local-maximum neighbourhood on every axis.
pub const LOCAL_MAX_REACH: usize = 3;

// ============================================================================
// Result types
// ============================================================================

/// Result of a peak search with diagnostics.
#[derive(Debug, Clone)]
pub struct PeakSearchResult {
    /// Accepted peaks in discovery order (largest count first).
    pub peaks: Vec<PeakCandidate>,
    pub diagnostics: PeakSearchDiagnostics,
}

/// Counts from each stage of the search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeakSearchDiagnostics {
    /// Histogram-selected threshold before adjustment, if auto-selection ran.
    pub computed_threshold: Option<usize>,
    /// Threshold the search used.
    pub threshold: usize,
    /// Bins of the whole volume above threshold, from the histogram.
    pub bins_above_threshold: u64,
    /// Bins of the scan region examined.
    pub scanned_bins: usize,
    /// Largest truncated count in the scan region.
    pub max_scanned_value: i64,
    /// Bins of the scan region above threshold.
    pub candidates_above_threshold: usize,
    pub rejected_overlap: usize,
    pub rejected_not_local_max: usize,
    pub rejected_undefined_centroid: usize,
    pub rejected_body_overlap: usize,
    pub accepted: usize,
}

/// Why a candidate bin was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The bin lies inside accepted peak `peak`.
    Overlaps { peak: usize },
    /// The refined peak overlaps accepted peak `peak`.
    BodyOverlaps { peak: usize },
    NotLocalMax,
    UndefinedCentroid,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Overlaps { peak } => write!(f, "Overlaps Peak#{}", peak),
            Rejection::BodyOverlaps { peak } => write!(f, "Body Overlaps Peak#{}", peak),
            Rejection::NotLocalMax => f.write_str("Not Local Max"),
            Rejection::UndefinedCentroid => f.write_str("Undefined Centroid"),
        }
    }
}

impl PeakSearchDiagnostics {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Overlaps { .. } => self.rejected_overlap += 1,
            Rejection::BodyOverlaps { .. } => self.rejected_body_overlap += 1,
            Rejection::NotLocalMax => self.rejected_not_local_max += 1,
            Rejection::UndefinedCentroid => self.rejected_undefined_centroid += 1,
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Find up to `config.num_requested` peaks whose discovery bins lie in
/// `region`.
///
/// The volume is taken as a [`Cow`] so the caller states who owns it:
/// [`Smoothing::InPlace`] reuses the storage of an owned volume and copies a
/// borrowed one. `histogram` is cleared and filled with the count histogram
/// of the (possibly smoothed) volume; its length is the number of histogram
/// bins.
///
/// Fails only when `histogram` is empty. Every discarded candidate is logged
/// with its reason and counted in the diagnostics.
pub fn find_peaks(
    volume: Cow<'_, CountVolume>,
    config: &PeakSearchConfig,
    region: &ScanRegion,
    histogram: &mut [u32],
    log: &mut dyn PeakLog,
) -> Result<PeakSearchResult, FindPeaksError> {
    if histogram.is_empty() {
        return Err(FindPeaksError::EmptyHistogram);
    }
    let started = Instant::now();

    log.append(&format!("NUMBER OF ROWS = {}", volume.rows()));
    log.append(&format!("NUMBER OF COLS = {}", volume.cols()));
    log.append(&format!("NUMBER OF PAGES = {}", volume.channels()));

    let volume = apply_smoothing(volume, config.smoothing);
    let region = region.resolve(&volume);
    log_region(&region, log);

    // Threshold
    let thresholder = HistogramThresholder::from_volume(&volume, histogram);
    let floor = if config.smoothing.is_enabled() {
        SMOOTHED_THRESHOLD_FLOOR
    } else {
        RAW_THRESHOLD_FLOOR
    };
    let selection = thresholder.select(config.threshold, floor);

    let mut diagnostics = PeakSearchDiagnostics {
        computed_threshold: selection.computed,
        threshold: selection.threshold,
        bins_above_threshold: thresholder.bins_above(selection.threshold),
        ..Default::default()
    };
    if let Some(computed) = selection.computed {
        log.append(&format!("COMPUTED THRESHOLD = {}", computed));
    }
    log.append(&format!("THRESHOLD = {}", diagnostics.threshold));
    log.append(&format!("NUM_ABOVE = {}", diagnostics.bins_above_threshold));
    tracing::debug!(
        "Threshold {} ({} of {} bins above)",
        diagnostics.threshold,
        diagnostics.bins_above_threshold,
        thresholder.total_bins()
    );
    let threshold_time = started.elapsed();

    // Collection
    let mut bins = collect_candidates(&volume, &region, diagnostics.threshold, &mut diagnostics);
    log.append(&format!("NUM BINS = {}", diagnostics.scanned_bins));
    log.append(&format!("MAX = {}", diagnostics.max_scanned_value));
    log.append(&format!(
        "{} interior bins over {}",
        bins.len(),
        diagnostics.threshold
    ));
    bins.sort_unstable();
    tracing::debug!("{} candidate bins above threshold", bins.len());
    let sort_time = started.elapsed();

    // Acceptance
    let peaks = accept_peaks(&volume, &bins, config.num_requested, &mut diagnostics, log);
    diagnostics.accepted = peaks.len();
    let total_time = started.elapsed();

    log.append("");
    log.append(&format!("NUMBER OF PEAKS = {}", peaks.len()));
    log.append(&format!("Time to threshold  = {:?}", threshold_time));
    log.append(&format!("Time to sort       = {:?}", sort_time - threshold_time));
    log.append(&format!("Time to find peaks = {:?}", total_time - sort_time));
    log.append("--- Peaks Found ---");
    for (index, peak) in peaks.iter().enumerate() {
        log.append(&format!("Peak #{:2}  {}", index, peak.summary_line(&volume)));
    }

    tracing::info!(
        "Found {} peaks ({} candidates, threshold {}) in {:?}",
        peaks.len(),
        diagnostics.candidates_above_threshold,
        diagnostics.threshold,
        total_time
    );

    Ok(PeakSearchResult { peaks, diagnostics })
}

fn apply_smoothing(volume: Cow<'_, CountVolume>, smoothing: Smoothing) -> Cow<'_, CountVolume> {
    match (smoothing, volume) {
        (Smoothing::None, volume) => volume,
        (Smoothing::Copy, volume) => Cow::Owned(volume.smoothed()),
        (Smoothing::InPlace, Cow::Owned(volume)) => Cow::Owned(volume.into_smoothed()),
        (Smoothing::InPlace, Cow::Borrowed(volume)) => {
            tracing::debug!("Borrowed volume cannot be smoothed in place, copying");
            Cow::Owned(volume.smoothed())
        }
    }
}

fn log_region(region: &ResolvedRegion, log: &mut dyn PeakLog) {
    let numbers = |indices: &[usize]| {
        indices
            .iter()
            .map(|i| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };
    log.append(&format!("ROWS CHECKED: {}", numbers(&region.rows)));
    log.append(&format!("COLS CHECKED: {}", numbers(&region.cols)));
    log.append(&format!("MIN_CHAN = {}", region.min_chan));
    log.append(&format!("MAX_CHAN = {}", region.max_chan));
}

/// Every bin of the region whose truncated count exceeds `threshold`.
fn collect_candidates(
    volume: &CountVolume,
    region: &ResolvedRegion,
    threshold: usize,
    diagnostics: &mut PeakSearchDiagnostics,
) -> Vec<PeakBin> {
    let threshold = threshold as i64;
    let mut bins = Vec::new();
    let mut max_value = 0i64;
    let mut scanned = 0usize;

    for &row in &region.rows {
        for &col in &region.cols {
            for chan in region.min_chan..=region.max_chan {
                let value = truncated_count(volume.get(row, col, chan));
                scanned += 1;
                max_value = max_value.max(value);
                if value > threshold {
                    bins.push(PeakBin {
                        value,
                        row,
                        col,
                        chan,
                    });
                }
            }
        }
    }

    diagnostics.scanned_bins = scanned;
    diagnostics.max_scanned_value = max_value;
    diagnostics.candidates_above_threshold = bins.len();
    bins
}

/// Walk `bins` (sorted ascending) from the largest count down.
fn accept_peaks(
    volume: &CountVolume,
    bins: &[PeakBin],
    num_requested: usize,
    diagnostics: &mut PeakSearchDiagnostics,
    log: &mut dyn PeakLog,
) -> Vec<PeakCandidate> {
    let mut peaks: Vec<PeakCandidate> = Vec::new();

    for &bin in bins.iter().rev() {
        if peaks.len() >= num_requested {
            break;
        }

        match try_accept(volume, bin, &peaks, log) {
            Ok(peak) => {
                log.append(&format!(
                    "*******{}:  ADDED PEAK {:3} {:3} {:4} {:6}",
                    peaks.len(),
                    bin.col,
                    bin.row,
                    bin.chan,
                    bin.value
                ));
                peaks.push(peak);
            }
            Err(rejection) => {
                log.append(&format!(
                    "{:3} {:3} {:4} {:6} Discarded: {}",
                    bin.col, bin.row, bin.chan, bin.value, rejection
                ));
                diagnostics.record(rejection);
            }
        }
    }

    peaks
}

fn try_accept(
    volume: &CountVolume,
    bin: PeakBin,
    accepted: &[PeakCandidate],
    log: &mut dyn PeakLog,
) -> Result<PeakCandidate, Rejection> {
    if let Some(peak) = accepted
        .iter()
        .position(|p| p.overlaps_bin(bin.row, bin.col, bin.chan))
    {
        return Err(Rejection::Overlaps { peak });
    }

    if !is_local_max(volume, bin.row, bin.col, bin.chan) {
        return Err(Rejection::NotLocalMax);
    }

    log.append("");
    log.append(&format!(
        "CHECKING POSSIBLE PEAK {:3} {:3} {:4} {:6}",
        bin.col, bin.row, bin.chan, bin.value
    ));
    let candidate = PeakCandidate::compute_centroid_and_extent(volume, bin, log).map_err(|e| {
        tracing::trace!("Candidate at {:?} not refined: {}", bin, e);
        Rejection::UndefinedCentroid
    })?;

    if let Some(peak) = accepted.iter().position(|p| p.overlaps(&candidate)) {
        return Err(Rejection::BodyOverlaps { peak });
    }

    Ok(candidate)
}

/// False if any bin within ±[`LOCAL_MAX_REACH`] (clipped to the volume)
/// holds a strictly larger count than `(row, col, chan)`.
pub fn is_local_max(volume: &CountVolume, row: usize, col: usize, chan: usize) -> bool {
    let value = volume.get(row, col, chan);
    let range = |center: usize, len: usize| {
        center.saturating_sub(LOCAL_MAX_REACH)..=(center + LOCAL_MAX_REACH).min(len - 1)
    };

    for r in range(row, volume.rows()) {
        for c in range(col, volume.cols()) {
            for ch in range(chan, volume.channels()) {
                if volume.get(r, c, ch) > value {
                    return false;
                }
            }
        }
    }
    true
}

// ============================================================================
// PeakFinder
// ============================================================================

/// Owns a [`PeakSearchConfig`] and the histogram buffer it needs.
#[derive(Debug, Clone, Default)]
pub struct PeakFinder {
    config: PeakSearchConfig,
}

impl PeakFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: PeakSearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakSearchConfig {
        &self.config
    }

    /// Run [`find_peaks`] with a freshly allocated histogram, returned
    /// alongside the result.
    pub fn find(
        &self,
        volume: Cow<'_, CountVolume>,
        region: &ScanRegion,
        log: &mut dyn PeakLog,
    ) -> Result<(PeakSearchResult, Vec<u32>), FindPeaksError> {
        self.config.validate();

        let mut histogram = vec![0u32; self.config.histogram_bins];
        let result = find_peaks(volume, &self.config, region, &mut histogram, log)?;
        Ok((result, histogram))
    }

    /// Search the whole of a borrowed volume.
    pub fn find_all(
        &self,
        volume: &CountVolume,
        log: &mut dyn PeakLog,
    ) -> Result<PeakSearchResult, FindPeaksError> {
        let region = ScanRegion::full(volume);
        self.find(Cow::Borrowed(volume), &region, log)
            .map(|(result, _)| result)
    }
}
