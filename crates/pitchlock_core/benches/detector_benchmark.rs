//! Performance benchmarks for the detection engine
//!
//! Run with: cargo bench -p pitchlock_core

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pitchlock_core::{Detector, DetectorConfig};

fn sine_block(freq: f32, offset: usize, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * (offset + i) as f32 / 48000.0).sin())
        .collect()
}

fn benchmark_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector");

    // Common host buffer sizes
    for size in [64usize, 256, 512, 1024] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_{}_samples", size), |b| {
            let mut detector = Detector::new(48000.0, DetectorConfig::default()).unwrap();
            // settle onto the tone so the steady-state path is measured
            let mut offset = 0;
            for _ in 0..200 {
                let block = sine_block(440.0, offset, size);
                detector.process(&block, None);
                offset += size;
            }
            let block = sine_block(440.0, offset, size);

            b.iter(|| {
                black_box(detector.process(black_box(&block), None));
            });
        });
    }

    group.finish();
}

fn benchmark_midi_variant(c: &mut Criterion) {
    c.bench_function("process_midi_512_samples", |b| {
        let mut detector = Detector::new(48000.0, DetectorConfig::midi()).unwrap();
        let mut offset = 0;
        for _ in 0..200 {
            let block = sine_block(440.0, offset, 512);
            detector.process(&block, None);
            offset += 512;
        }
        let block = sine_block(440.0, offset, 512);

        b.iter(|| {
            black_box(detector.process(black_box(&block), None));
        });
    });
}

criterion_group!(benches, benchmark_process, benchmark_midi_variant);
criterion_main!(benches);
