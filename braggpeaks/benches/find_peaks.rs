use std::borrow::Cow;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use braggpeaks::synthetic::{GaussianBump, gaussian_bumps};
use braggpeaks::{CountVolume, NullLog, PeakSearchConfig, ScanRegion, Smoothing, find_peaks};

/// A detector-sized volume with a grid of peaks of varying strength.
fn bench_volume() -> CountVolume {
    let bumps: Vec<GaussianBump> = (0..6)
        .flat_map(|i| {
            (0..6).map(move |j| {
                GaussianBump::new(
                    12.0 + 16.0 * i as f32,
                    12.0 + 16.0 * j as f32,
                    10.0 + 8.0 * ((i + j) % 4) as f32,
                    40.0 + 10.0 * (i * 6 + j) as f32,
                )
            })
        })
        .collect();
    gaussian_bumps(100, 100, 48, 3.0, &bumps)
        .unwrap_or_else(|e| panic!("Failed to build benchmark volume: {}", e))
}

fn bench_find_peaks(c: &mut Criterion) {
    let volume = bench_volume();
    let region = ScanRegion::full(&volume);
    let mut group = c.benchmark_group("find_peaks");

    for smoothing in [Smoothing::None, Smoothing::Copy] {
        let config = PeakSearchConfig {
            smoothing,
            ..Default::default()
        };
        let mut histogram = vec![0u32; config.histogram_bins];

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", smoothing)),
            &config,
            |b, config| {
                b.iter(|| {
                    let result = find_peaks(
                        Cow::Borrowed(&volume),
                        config,
                        &region,
                        &mut histogram,
                        &mut NullLog,
                    )
                    .unwrap_or_else(|e| panic!("Peak search failed: {}", e));
                    black_box(result);
                })
            },
        );
    }
    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let volume = bench_volume();
    c.bench_function("smooth_copy", |b| b.iter(|| black_box(volume.smoothed())));
    c.bench_function("smooth_in_place", |b| {
        b.iter_batched(
            || volume.clone(),
            |v| black_box(v.into_smoothed()),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_find_peaks, bench_smoothing);
criterion_main!(benches);
