//! Braggpeaks - Bragg-peak search in time-of-flight neutron count volumes.
//!
//! A count volume is a three dimensional histogram indexed by detector row,
//! detector column and time-of-flight channel. This crate provides:
//! - Adaptive intensity thresholds from the count histogram
//! - Greedy local-maximum candidate search with overlap rejection
//! - Per-slice statistical refinement of centroid, extent and background
//! - A heuristic validity classification of every accepted peak
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::borrow::Cow;
//! use braggpeaks::{PeakFinder, PeakSearchConfig, ScanRegion, TracingLog};
//!
//! let finder = PeakFinder::from_config(PeakSearchConfig::default());
//! let region = ScanRegion::full(&volume);
//! let (result, histogram) = finder.find(Cow::Borrowed(&volume), &region, &mut TracingLog)?;
//!
//! for peak in result.peaks.iter().filter(|p| p.is_valid()) {
//!     println!("{}", peak.summary_line(&volume));
//! }
//! ```

mod config;
mod error;
mod log;
mod peak;
mod search;
mod slice_stats;
mod threshold;
mod volume;

pub mod synthetic;

// ============================================================================
// Input
// ============================================================================

pub use error::FindPeaksError;
pub use volume::CountVolume;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{PeakSearchConfig, ResolvedRegion, ScanRegion, Smoothing};

// ============================================================================
// Search
// ============================================================================

pub use log::{NullLog, PeakLog, TracingLog};
pub use search::{
    LOCAL_MAX_REACH, PeakFinder, PeakSearchDiagnostics, PeakSearchResult, Rejection, find_peaks,
    is_local_max,
};
pub use threshold::{
    DEFAULT_HISTOGRAM_BINS, HistogramThresholder, RAW_THRESHOLD_FLOOR, SMOOTHED_THRESHOLD_FLOOR,
    ThresholdSelection,
};

// ============================================================================
// Peaks
// ============================================================================

pub use peak::{
    Extent, INITIAL_CHANNEL_EXTENT, MAX_CENTROID_SHIFT, PeakBin, PeakCandidate, RefineError,
    SLICE_COUNT, ValidityFlags, ValidityTest,
};
pub use slice_stats::{REFINE_ITERATIONS, SliceStatistics};
