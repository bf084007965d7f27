//! Benchmarks for the push pipeline
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use datahub_rs::backup::{codec, MemoryBackupStore};
use datahub_rs::clock::ManualClock;
use datahub_rs::{DataSample, DataType, Hub, Transform};

fn hub() -> Hub {
    Hub::new(
        Box::new(ManualClock::new(1_700_000_000.0)),
        Box::new(MemoryBackupStore::new()),
    )
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_push");

    for fan_out in [1usize, 10, 100].iter() {
        let mut hub = hub();
        hub.create_input("/src", DataType::Numeric, "").unwrap();
        for i in 0..*fan_out {
            let dest = format!("/dest/o{}", i);
            hub.create_output(&dest, DataType::Numeric, "").unwrap();
            hub.set_source(&dest, Some("/src")).unwrap();
        }

        group.throughput(Throughput::Elements(*fan_out as u64));
        group.bench_with_input(BenchmarkId::new("outputs", fan_out), fan_out, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                let sample = DataSample::numeric(1.0 + i as f64, i as f64);
                hub.io_push("/src", DataType::Numeric, black_box(sample)).unwrap();
                i = i.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_push");

    for depth in [1usize, 8, 32].iter() {
        let mut hub = hub();
        hub.create_input("/n0", DataType::Numeric, "").unwrap();
        for i in 1..=*depth {
            hub.set_source(&format!("/n{}", i), Some(&format!("/n{}", i - 1))).unwrap();
        }

        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| {
                hub.io_push("/n0", DataType::Numeric, black_box(DataSample::numeric(5.0, 1.0)))
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_observation_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("observation_transform");

    for size in [10usize, 1000].iter() {
        let mut hub = hub();
        hub.create_observation("m").unwrap();
        hub.set_buffer_max_count("m", *size).unwrap();
        hub.set_transform("m", Transform::StdDev, &[]).unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("std_dev", size), size, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                let sample = DataSample::numeric(1.0 + i as f64, (i % 97) as f64);
                hub.admin_push("/obs/m", DataType::Numeric, black_box(sample)).unwrap();
                i = i.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_backup_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("backup_encode");

    for size in [100usize, 10_000].iter() {
        let samples: Vec<DataSample> = (0..*size)
            .map(|i| DataSample::numeric(i as f64, i as f64 * 0.5))
            .collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("numeric", size), &samples, |b, samples| {
            b.iter(|| black_box(codec::encode(DataType::Numeric, samples.iter())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_chain,
    bench_observation_transform,
    bench_backup_encode,
);

criterion_main!(benches);
