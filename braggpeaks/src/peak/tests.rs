//! Tests for candidate refinement, overlap predicates and validity tests.

use common::FloatExt;

use super::*;
use crate::log::NullLog;
use crate::synthetic::{GaussianBump, gaussian_bumps};

fn candidate_at(row: f32, col: f32, chan: f32, extent: (f32, f32, f32)) -> PeakCandidate {
    PeakCandidate {
        row_cent: row,
        col_cent: col,
        chan_cent: chan,
        init_row: row as usize,
        init_col: col as usize,
        init_chan: chan as usize,
        delta_row: extent.0,
        delta_col: extent.1,
        delta_chan: extent.2,
        ipk: 0.0,
        slices: [SliceStatistics::initial(0, row, col); SLICE_COUNT],
        validity: ValidityFlags::default(),
    }
}

fn bin(row: usize, col: usize, chan: usize) -> PeakBin {
    PeakBin {
        value: 0,
        row,
        col,
        chan,
    }
}

fn isolated_bump() -> CountVolume {
    gaussian_bumps(21, 21, 11, 2.0, &[GaussianBump::new(10.0, 10.0, 5.0, 100.0)]).unwrap()
}

/// Slice window with chosen IPKs and peak/background sums.
fn slices_with(ipk: [f32; 3], signal: [(f32, f32); 3]) -> [SliceStatistics; SLICE_COUNT] {
    let make = |ipk: f32, (peak_ave, back_ave): (f32, f32)| SliceStatistics {
        ipk,
        peak_num: 10,
        back_num: 10,
        peak_total: peak_ave * 10.0,
        back_total: back_ave * 10.0,
        ..SliceStatistics::initial(0, 0.0, 0.0)
    };
    let outer = make(0.0, (0.0, 0.0));
    [
        make(ipk[0], signal[0]),
        outer,
        make(ipk[1], signal[1]),
        outer,
        make(ipk[2], signal[2]),
    ]
}

#[test]
fn test_overlaps_bin_boundary() {
    let peak = candidate_at(10.0, 10.0, 5.0, (1.0, 1.0, 1.0));

    // 2 * 1 + 1 = 3 bins reach on every axis.
    assert!(peak.overlaps_bin(13, 10, 5));
    assert!(peak.overlaps_bin(7, 7, 8));
    assert!(!peak.overlaps_bin(14, 10, 5));
    assert!(!peak.overlaps_bin(10, 10, 9));
}

#[test]
fn test_overlaps_is_separable_per_axis() {
    let a = candidate_at(10.0, 10.0, 5.0, (1.0, 1.0, 1.0));
    let b = candidate_at(16.0, 10.0, 5.0, (1.5, 1.0, 1.0));
    let c = candidate_at(16.5, 10.0, 5.0, (1.5, 1.0, 1.0));
    let edge_chan = candidate_at(10.0, 10.0, 10.0, (1.0, 1.0, 1.0));
    let far_chan = candidate_at(10.0, 10.0, 11.0, (1.0, 1.0, 1.0));

    // Row reach is 2 * (1 + 1.5) + 1 = 6.
    assert!(a.overlaps(&b));
    assert!(b.overlaps(&a));
    assert!(!a.overlaps(&c));
    // Channel reach is 2 * (1 + 1) + 1 = 5, inclusive.
    assert!(a.overlaps(&edge_chan), "distance 5 is within reach");
    assert!(!a.overlaps(&far_chan));
    // Corner-to-corner: inside the box though outside any ellipsoid.
    let corner = candidate_at(15.9, 15.9, 9.0, (1.5, 1.5, 1.0));
    assert!(a.overlaps(&corner));
}

#[test]
fn test_refines_isolated_bump() {
    let volume = isolated_bump();
    let mut log: Vec<String> = Vec::new();

    let peak =
        PeakCandidate::compute_centroid_and_extent(&volume, bin(10, 10, 5), &mut log).unwrap();

    assert!(peak.row_centroid().within(10.0, 0.1), "row {}", peak.row_centroid());
    assert!(peak.col_centroid().within(10.0, 0.1), "col {}", peak.col_centroid());
    assert_eq!(peak.chan_centroid(), 5.0);
    assert_eq!(peak.discovery_bin(), (10, 10, 5));
    assert_eq!(peak.ipk(), volume.get(10, 10, 5));

    let extent = peak.extent();
    assert_eq!(extent.chan, INITIAL_CHANNEL_EXTENT);
    assert_eq!(extent.row, 2.0 * peak.middle_slice().row_std_dev);
    assert!(extent.row >= 2.0 && extent.col >= 2.0);

    assert!(peak.is_valid());
    assert!(peak.validity().passed(ValidityTest::IpkRatio));
    assert!(peak.validity().passed(ValidityTest::SignalToNoise));
    for test in [
        ValidityTest::Reserved1,
        ValidityTest::Reserved2,
        ValidityTest::Reserved3,
        ValidityTest::Reserved4,
    ] {
        assert!(!peak.validity().passed(test), "{} must stay unset", test);
    }

    assert!(log.iter().any(|l| l.starts_with("6:*** GOOD IPK Ratio")));
    assert!(log.iter().any(|l| l == "DATA FROM ADJACENT SLICES:"));
    let channels: Vec<usize> = peak.slices().iter().map(|s| s.channel).collect();
    assert_eq!(channels, vec![3, 4, 5, 6, 7]);
}

#[test]
fn test_slice_window_must_fit_in_volume() {
    let volume = isolated_bump();

    for chan in [0, 1, 9, 10] {
        let result = PeakCandidate::compute_centroid_and_extent(&volume, bin(10, 10, chan), &mut NullLog);
        assert!(
            matches!(result, Err(RefineError::MissingSlice { .. })),
            "chan {} gave {:?}",
            chan,
            result
        );
    }
}

#[test]
fn test_slice_window_at_channel_edges() {
    let channels = 11;
    let volume = gaussian_bumps(
        21,
        21,
        channels,
        2.0,
        &[
            GaussianBump::new(10.0, 10.0, 2.0, 100.0),
            GaussianBump::new(10.0, 10.0, (channels - 3) as f32, 100.0),
        ],
    )
    .unwrap();

    let low = PeakCandidate::compute_centroid_and_extent(&volume, bin(10, 10, 2), &mut NullLog)
        .unwrap();
    let slices: Vec<usize> = low.slices().iter().map(|s| s.channel).collect();
    assert_eq!(slices, vec![0, 1, 2, 3, 4]);

    let high = PeakCandidate::compute_centroid_and_extent(
        &volume,
        bin(10, 10, channels - 3),
        &mut NullLog,
    )
    .unwrap();
    let slices: Vec<usize> = high.slices().iter().map(|s| s.channel).collect();
    assert_eq!(slices, vec![6, 7, 8, 9, 10]);
}

#[test]
fn test_flat_field_is_rejected() {
    let volume = CountVolume::filled(41, 41, 5, 4.0).unwrap();
    let mut log = String::new();

    let result = PeakCandidate::compute_centroid_and_extent(&volume, bin(20, 20, 2), &mut log);

    assert_eq!(result, Err(RefineError::UndefinedRowCentroid));
    assert!(log.contains("ERROR: row centroid undefined"));
}

#[test]
fn test_centroid_drift_limit() {
    assert_eq!(checked_centroid(14.9, 10.0, Axis::Row), Ok(14.9));
    assert_eq!(checked_centroid(5.5, 10.0, Axis::Col), Ok(5.5));
    assert!(matches!(
        checked_centroid(15.0, 10.0, Axis::Row),
        Err(RefineError::RowCentroidDrift { .. })
    ));
    assert!(matches!(
        checked_centroid(4.0, 10.0, Axis::Col),
        Err(RefineError::ColCentroidDrift { .. })
    ));
    assert_eq!(
        checked_centroid(f32::NAN, 10.0, Axis::Col),
        Err(RefineError::UndefinedColCentroid)
    );
}

#[test]
fn test_validity_is_an_or_of_three_tests() {
    let mut flags = ValidityFlags::default();
    assert!(!flags.is_valid());

    flags.set(ValidityTest::SignalToNoise, true);
    assert!(!flags.is_valid(), "signal to noise alone must not validate");

    for test in [
        ValidityTest::IpkRatio,
        ValidityTest::PeakToBackground,
        ValidityTest::SignalRatio,
    ] {
        let mut flags = ValidityFlags::default();
        flags.set(test, true);
        assert!(flags.is_valid(), "{} alone should validate", test);
    }

    assert_eq!(flags.iter().count(), 8);
    assert_eq!(ValidityTest::SignalRatio.number(), 8);
}

#[test]
fn test_ipk_ratio_falls_back_to_center_ipk() {
    // Outer slices empty: the centre IPK must exceed 9 on its own.
    let pass = classify(&slices_with([0.0, 10.0, 0.0], [(0.0, 0.0); 3]), &mut NullLog);
    let fail = classify(&slices_with([0.0, 9.0, 0.0], [(0.0, 0.0); 3]), &mut NullLog);
    assert!(pass.passed(ValidityTest::IpkRatio));
    assert!(!fail.passed(ValidityTest::IpkRatio));

    // IPKs are not truncated: 9.5 clears the fallback, and fractional
    // outer maxima take the ratio branch.
    let fractional = classify(&slices_with([0.0, 9.5, 0.0], [(0.0, 0.0); 3]), &mut NullLog);
    assert!(fractional.passed(ValidityTest::IpkRatio));
    let faint_outer = classify(&slices_with([0.5, 9.5, 0.5], [(0.0, 0.0); 3]), &mut NullLog);
    assert!(faint_outer.passed(ValidityTest::IpkRatio), "9.5 / 0.5 > 3");
    let faint_ratio = classify(&slices_with([0.5, 1.4, 0.5], [(0.0, 0.0); 3]), &mut NullLog);
    assert!(!faint_ratio.passed(ValidityTest::IpkRatio), "1.4 / 0.5 is not above 3");

    // With outer IPKs the ratio must exceed 3.
    let ratio = classify(&slices_with([4.0, 13.0, 4.0], [(0.0, 0.0); 3]), &mut NullLog);
    let no_ratio = classify(&slices_with([4.0, 12.0, 4.0], [(0.0, 0.0); 3]), &mut NullLog);
    assert!(ratio.passed(ValidityTest::IpkRatio));
    assert!(!no_ratio.passed(ValidityTest::IpkRatio));
}

#[test]
fn test_signal_ratio_uses_outer_slices() {
    let mut log: Vec<String> = Vec::new();
    // Centre signal 26 against outer average |(-1 + -3) / 2| = 2 -> 13.
    let flags = classify(
        &slices_with([0.0; 3], [(1.0, 2.0), (30.0, 4.0), (1.0, 4.0)]),
        &mut log,
    );
    assert!(flags.passed(ValidityTest::SignalRatio));
    assert!(flags.passed(ValidityTest::PeakToBackground), "30 / 4 > 4");
    assert!(log.iter().any(|l| l.starts_with("8:*** GOOD")));

    // No outer signal: centre signal must exceed 12.
    let flags = classify(
        &slices_with([0.0; 3], [(0.0, 0.0), (14.0, 2.0), (0.0, 0.0)]),
        &mut NullLog,
    );
    assert!(!flags.passed(ValidityTest::SignalRatio), "12 is not above 12");
    assert!(flags.is_valid(), "14 / 2 still passes peak/background");
}

#[test]
fn test_summary_line_marks_valid_peaks() {
    let volume = isolated_bump();
    let peak = PeakCandidate::compute_centroid_and_extent(&volume, bin(10, 10, 5), &mut NullLog).unwrap();

    let line = peak.summary_line(&volume);

    assert!(line.ends_with("  VALID"), "line: {:?}", line);
    assert!(line.contains("   102  "), "ipk column in {:?}", line);

    let invalid = candidate_at(3.0, 4.0, 2.0, (2.0, 2.0, 1.0));
    let line = invalid.summary_line(&volume);
    assert!(!line.contains("VALID"));
    assert!(line.starts_with("    4.00     3.00     2.00"), "line: {:?}", line);
}

#[test]
fn test_display_region_flips_rows_and_pads() {
    let rows = 4;
    let cols = 5;
    let channels = 3;
    let values: Vec<f32> = (0..rows * cols * channels).map(|i| i as f32 + 1.0).collect();
    let volume = CountVolume::new(rows, cols, channels, values).unwrap();
    let peak = candidate_at(0.0, 0.0, 1.0, (1.0, 1.0, 1.0));

    let region = peak.display_region(3, 3, 3, &volume);

    assert_eq!(region.dims(), (3, 3, 3));
    // Block row 0 (volume row -1) is padding and lands last after the flip.
    for chan in 0..3 {
        for col in 0..3 {
            assert_eq!(region[(chan, 2, col)], 0.0);
        }
        // Column -1 is padding as well.
        assert_eq!(region[(chan, 0, 0)], 0.0);
    }
    // Block (chan 1, row 1, col 1) = volume (0, 0, 1), stored at flipped row 1.
    assert_eq!(region[(1, 1, 1)], volume.get(0, 0, 1));
    // Block row 2 = volume row 1, flipped to the top.
    assert_eq!(region[(0, 0, 2)], volume.get(1, 1, 0));
}
