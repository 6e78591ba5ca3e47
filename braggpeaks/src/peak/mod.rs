//! Peak candidates: sub-pixel centroid, extent and validity classification.
//!
//! A candidate is built from the local-maximum bin found by the search. Five
//! channel slices centred on that bin are refined independently (see
//! [`crate::slice_stats`]); the row/column centroid and extent come from the
//! middle slice alone, the channel centre stays on the discovery channel.
//! The slices on either side feed the validity tests.

#[cfg(test)]
mod tests;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

use common::Buffer3;

use crate::log::PeakLog;
use crate::slice_stats::SliceStatistics;
use crate::volume::CountVolume;

// ============================================================================
// Constants
// ============================================================================

/// Number of channel slices refined per candidate.
pub const SLICE_COUNT: usize = 5;

/// Index of the discovery channel within the slice window.
const MIDDLE: usize = SLICE_COUNT / 2;

/// Channel half-width; refinement leaves it unchanged.
pub const INITIAL_CHANNEL_EXTENT: f32 = 1.0;

/// A centroid this far (or further) from the discovery bin is rejected.
pub const MAX_CENTROID_SHIFT: f32 = 5.0;

const MIN_SIGNAL_TO_NOISE: f32 = 5.0;
const MIN_IPK_RATIO: f32 = 3.0;
const MIN_IPK: f32 = 9.0;
const MIN_PEAK_TO_BACKGROUND: f32 = 4.0;
const MIN_SIGNAL_RATIO: f32 = 12.0;
const MIN_CENTER_SIGNAL: f32 = 12.0;

// ============================================================================
// Discovery bin
// ============================================================================

/// A bin above threshold, ordered by truncated count and then position.
///
/// Field order defines the derived ordering: sorting ascending and walking
/// backwards visits the largest counts first with a deterministic tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeakBin {
    pub value: i64,
    pub row: usize,
    pub col: usize,
    pub chan: usize,
}

// ============================================================================
// Validity tests
// ============================================================================

/// The eight validity tests. Only [`ValidityTest::IpkRatio`],
/// [`ValidityTest::PeakToBackground`] and [`ValidityTest::SignalRatio`] decide
/// [`PeakCandidate::is_valid`]; signal-to-noise is computed and logged only,
/// and the four reserved slots are never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ValidityTest {
    #[strum(to_string = "Reserved 1")]
    Reserved1,
    #[strum(to_string = "Reserved 2")]
    Reserved2,
    #[strum(to_string = "Reserved 3")]
    Reserved3,
    #[strum(to_string = "Reserved 4")]
    Reserved4,
    #[strum(to_string = "Signal To Noise")]
    SignalToNoise,
    #[strum(to_string = "IPK Ratio")]
    IpkRatio,
    #[strum(to_string = "pkave/backave")]
    PeakToBackground,
    #[strum(to_string = "signal/2_signals")]
    SignalRatio,
}

impl ValidityTest {
    /// One-based test number used in log lines.
    pub fn number(self) -> usize {
        self as usize + 1
    }
}

/// Outcome of each [`ValidityTest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityFlags([bool; 8]);

impl ValidityFlags {
    #[inline]
    pub fn passed(&self, test: ValidityTest) -> bool {
        self.0[test as usize]
    }

    #[inline]
    fn set(&mut self, test: ValidityTest, passed: bool) {
        self.0[test as usize] = passed;
    }

    /// IPK ratio OR peak/background ratio OR cross-slice signal ratio.
    pub fn is_valid(&self) -> bool {
        self.passed(ValidityTest::IpkRatio)
            || self.passed(ValidityTest::PeakToBackground)
            || self.passed(ValidityTest::SignalRatio)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValidityTest, bool)> + '_ {
        ValidityTest::iter().map(move |test| (test, self.passed(test)))
    }
}

// ============================================================================
// Refinement failures
// ============================================================================

/// Why a candidate could not be refined. The search discards such candidates.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RefineError {
    #[error("channel slices {first}..={last} are not all inside the volume")]
    MissingSlice { first: i64, last: i64 },

    #[error("row centroid undefined")]
    UndefinedRowCentroid,

    #[error("column centroid undefined")]
    UndefinedColCentroid,

    #[error("row centroid moved by {shift:.2} pixels")]
    RowCentroidDrift { shift: f32 },

    #[error("column centroid moved by {shift:.2} pixels")]
    ColCentroidDrift { shift: f32 },
}

// ============================================================================
// PeakCandidate
// ============================================================================

/// Half-widths of a peak footprint along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub row: f32,
    pub col: f32,
    pub chan: f32,
}

/// A refined Bragg-peak candidate. Coordinates are 0-based bin positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakCandidate {
    row_cent: f32,
    col_cent: f32,
    chan_cent: f32,
    init_row: usize,
    init_col: usize,
    init_chan: usize,
    delta_row: f32,
    delta_col: f32,
    delta_chan: f32,
    ipk: f32,
    slices: [SliceStatistics; SLICE_COUNT],
    validity: ValidityFlags,
}

impl PeakCandidate {
    /// Refine the candidate seeded at `bin`.
    ///
    /// Fails when the five-slice channel window leaves the volume or when
    /// the middle slice has no usable centroid within
    /// [`MAX_CENTROID_SHIFT`] of the seed. Nothing is returned on failure,
    /// so a caller never sees a partially refined candidate.
    pub fn compute_centroid_and_extent(
        volume: &CountVolume,
        bin: PeakBin,
        log: &mut dyn PeakLog,
    ) -> Result<Self, RefineError> {
        let first = bin.chan as i64 - MIDDLE as i64;
        let last = bin.chan as i64 + MIDDLE as i64;
        if first < 0 || last >= volume.channels() as i64 {
            log.append(&format!(
                "ERROR: slice window {}..={} leaves the volume",
                first, last
            ));
            return Err(RefineError::MissingSlice { first, last });
        }

        let seed_row = bin.row as f32;
        let seed_col = bin.col as f32;
        let slices: [SliceStatistics; SLICE_COUNT] = std::array::from_fn(|i| {
            SliceStatistics::refined(volume, first as usize + i, seed_row, seed_col)
        });
        let middle = slices[MIDDLE];

        log.append("");
        log.append(&SliceStatistics::header());
        log.append(&middle.to_string());

        let row_cent = checked_centroid(middle.row_centroid(), seed_row, Axis::Row).map_err(|e| {
            log.append(&format!("ERROR: {}", e));
            e
        })?;
        let col_cent = checked_centroid(middle.col_centroid(), seed_col, Axis::Col).map_err(|e| {
            log.append(&format!("ERROR: {}", e));
            e
        })?;

        log.append("");
        log.append("DATA FROM ADJACENT SLICES:");
        for slice in &slices {
            log.append(&slice.to_string());
        }

        let validity = classify(&slices, log);

        Ok(Self {
            row_cent,
            col_cent,
            chan_cent: bin.chan as f32,
            init_row: bin.row,
            init_col: bin.col,
            init_chan: bin.chan,
            delta_row: 2.0 * middle.row_std_dev,
            delta_col: 2.0 * middle.col_std_dev,
            delta_chan: INITIAL_CHANNEL_EXTENT,
            ipk: volume.get(bin.row, bin.col, bin.chan),
            slices,
            validity,
        })
    }

    /// True if the bin lies within `2 × extent + 1` of this peak's centre on
    /// every axis.
    pub fn overlaps_bin(&self, row: usize, col: usize, chan: usize) -> bool {
        (row as f32 - self.row_cent).abs() <= 2.0 * self.delta_row + 1.0
            && (col as f32 - self.col_cent).abs() <= 2.0 * self.delta_col + 1.0
            && (chan as f32 - self.chan_cent).abs() <= 2.0 * self.delta_chan + 1.0
    }

    /// True if the centres are within `2 × (extent + other extent) + 1` on
    /// every axis. Separable per axis, deliberately looser than an ellipsoid.
    pub fn overlaps(&self, other: &PeakCandidate) -> bool {
        (self.row_cent - other.row_cent).abs() <= 2.0 * (self.delta_row + other.delta_row) + 1.0
            && (self.col_cent - other.col_cent).abs()
                <= 2.0 * (self.delta_col + other.delta_col) + 1.0
            && (self.chan_cent - other.chan_cent).abs()
                <= 2.0 * (self.delta_chan + other.delta_chan) + 1.0
    }

    #[inline]
    pub fn row_centroid(&self) -> f32 {
        self.row_cent
    }

    #[inline]
    pub fn col_centroid(&self) -> f32 {
        self.col_cent
    }

    /// The discovery channel; channel centroids are not refined.
    #[inline]
    pub fn chan_centroid(&self) -> f32 {
        self.chan_cent
    }

    /// `(row, col, chan)` of the local maximum this candidate grew from.
    #[inline]
    pub fn discovery_bin(&self) -> (usize, usize, usize) {
        (self.init_row, self.init_col, self.init_chan)
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        Extent {
            row: self.delta_row,
            col: self.delta_col,
            chan: self.delta_chan,
        }
    }

    /// Count at the discovery bin, taken from the (possibly smoothed) volume
    /// that was searched.
    #[inline]
    pub fn ipk(&self) -> f32 {
        self.ipk
    }

    #[inline]
    pub fn slices(&self) -> &[SliceStatistics; SLICE_COUNT] {
        &self.slices
    }

    #[inline]
    pub fn middle_slice(&self) -> &SliceStatistics {
        &self.slices[MIDDLE]
    }

    #[inline]
    pub fn validity(&self) -> ValidityFlags {
        self.validity
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }

    /// `col row chan ipk Δcol Δrow Δchan`, suffixed with `VALID` when valid.
    /// The count is read from `volume` at the discovery bin.
    pub fn summary_line(&self, volume: &CountVolume) -> String {
        let counts = volume.get(self.init_row, self.init_col, self.init_chan);
        let mut line = format!(
            "{:8.2} {:8.2} {:8.2}   {:4}  {:5.2}  {:5.2}  {:5.2}",
            self.col_cent,
            self.row_cent,
            self.chan_cent,
            counts as i64,
            self.delta_col,
            self.delta_row,
            self.delta_chan
        );
        if self.is_valid() {
            line.push_str("  VALID");
        }
        line
    }

    /// Copy an `n_rows × n_cols × n_chans` block centred on this peak into a
    /// buffer indexed `[chan][row][col]`.
    ///
    /// Rows are flipped so the first row of the block is last, which puts
    /// row 0 at the top in image viewers. Parts of the block outside the
    /// volume stay zero, keeping the peak centre in the middle of the block.
    pub fn display_region(
        &self,
        n_rows: usize,
        n_cols: usize,
        n_chans: usize,
        volume: &CountVolume,
    ) -> Buffer3<f32> {
        let mut out = Buffer3::new_default(n_chans, n_rows, n_cols);

        let (chans, chan_offset) = block_range(self.chan_cent, n_chans, volume.channels());
        let (rows, row_offset) = block_range(self.row_cent, n_rows, volume.rows());
        let (cols, col_offset) = block_range(self.col_cent, n_cols, volume.cols());

        for (i_chan, chan) in (chan_offset..).zip(chans) {
            for (i_row, row) in (row_offset..).zip(rows.clone()) {
                for (i_col, col) in (col_offset..).zip(cols.clone()) {
                    out[(i_chan, n_rows - 1 - i_row, i_col)] = volume.get(row, col, chan);
                }
            }
        }
        out
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

/// Accept a middle-slice centroid only if defined and close to the seed.
fn checked_centroid(centroid: f32, seed: f32, axis: Axis) -> Result<f32, RefineError> {
    if centroid.is_nan() {
        return Err(match axis {
            Axis::Row => RefineError::UndefinedRowCentroid,
            Axis::Col => RefineError::UndefinedColCentroid,
        });
    }
    let shift = (centroid - seed).abs();
    if shift >= MAX_CENTROID_SHIFT {
        return Err(match axis {
            Axis::Row => RefineError::RowCentroidDrift { shift },
            Axis::Col => RefineError::ColCentroidDrift { shift },
        });
    }
    Ok(centroid)
}

/// Volume indices covered by a block of `len` bins centred at `center`, and
/// the block offset of the first covered index.
fn block_range(center: f32, len: usize, axis_len: usize) -> (std::ops::Range<usize>, usize) {
    let start = (center + 0.5).floor() as i64 - (len / 2) as i64;
    let end = (start + len as i64).min(axis_len as i64);
    let offset = (-start).max(0) as usize;
    let first = start.max(0);
    if end <= first {
        return (0..0, 0);
    }
    (first as usize..end as usize, offset)
}

fn report(log: &mut dyn PeakLog, test: ValidityTest, passed: bool, detail: String) {
    let verdict = if passed { "*** GOOD" } else { "  FAILED" };
    log.append(&format!("{}:{} {}", test.number(), verdict, detail));
}

/// Run the validity tests on a refined slice window.
///
/// IPKs are compared untruncated: a centre maximum of 9.5 clears the
/// `> 9` fallback, and outer maxima below 1 still take the ratio branch.
fn classify(slices: &[SliceStatistics; SLICE_COUNT], log: &mut dyn PeakLog) -> ValidityFlags {
    let mut flags = ValidityFlags::default();
    let first = &slices[0];
    let middle = &slices[MIDDLE];
    let last = &slices[SLICE_COUNT - 1];

    // Signal to noise on the centre slice.
    let sig_to_noise = middle.signal_to_noise();
    let passed = sig_to_noise > MIN_SIGNAL_TO_NOISE;
    flags.set(ValidityTest::SignalToNoise, passed);
    report(
        log,
        ValidityTest::SignalToNoise,
        passed,
        format!("{} = {}", ValidityTest::SignalToNoise, sig_to_noise),
    );

    // Centre IPK against the slices two channels away. With nothing there the
    // count rate is very low, so fall back to the centre IPK alone.
    let ave_ipk = (first.ipk + last.ipk) / 2.0;
    let (passed, detail) = if ave_ipk > 0.0 {
        let ratio = middle.ipk / ave_ipk;
        (ratio > MIN_IPK_RATIO, format!("{} = {}", ValidityTest::IpkRatio, ratio))
    } else if middle.ipk > MIN_IPK {
        (true, format!("Modified IPK = {}", middle.ipk))
    } else {
        (false, format!("{} undefined", ValidityTest::IpkRatio))
    };
    flags.set(ValidityTest::IpkRatio, passed);
    report(log, ValidityTest::IpkRatio, passed, detail);

    // Average peak pixel against average background pixel.
    let back_ave = middle.background_average();
    let (passed, detail) = if back_ave > 0.0 {
        let ratio = middle.peak_average() / back_ave;
        (
            ratio > MIN_PEAK_TO_BACKGROUND,
            format!("{} = {}", ValidityTest::PeakToBackground, ratio),
        )
    } else {
        (false, format!("{} undefined", ValidityTest::PeakToBackground))
    };
    flags.set(ValidityTest::PeakToBackground, passed);
    report(log, ValidityTest::PeakToBackground, passed, detail);

    // Net centre signal against the outer slices' net signal.
    let center_signal = middle.signal();
    let outer_signal = ((first.signal() + last.signal()) / 2.0).abs();
    let (passed, detail) = if outer_signal > 0.0 {
        let ratio = center_signal / outer_signal;
        (
            ratio > MIN_SIGNAL_RATIO,
            format!("{} = {}", ValidityTest::SignalRatio, ratio),
        )
    } else {
        (
            center_signal > MIN_CENTER_SIGNAL,
            format!("center_signal = {}", center_signal),
        )
    };
    flags.set(ValidityTest::SignalRatio, passed);
    report(log, ValidityTest::SignalRatio, passed, detail);

    let passed: Vec<String> = flags
        .iter()
        .filter(|&(_, ok)| ok)
        .map(|(test, _)| test.to_string())
        .collect();
    log.append(&format!("PASSED: [{}]", passed.join(", ")));

    flags
}
