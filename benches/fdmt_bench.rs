//! FDMT benchmarks: plan construction and full execution.
//!
//! Run with: cargo bench --bench fdmt_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use fdmt::{set_num_threads, Fdmt, FdmtPlan, InstrumentConfig, Waterfall};

fn lband(nchans: usize, nsamps: usize) -> InstrumentConfig {
    InstrumentConfig::new(1200.0, 1600.0, nchans, nsamps, 64e-6, 512)
}

fn noise(len: usize) -> Vec<f32> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u64 << 24) as f32
        })
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fdmt_plan");
    for nchans in [256usize, 1024, 4096] {
        let config = lband(nchans, 4096);
        group.bench_with_input(BenchmarkId::from_parameter(nchans), &config, |b, config| {
            b.iter(|| FdmtPlan::build(black_box(config)).unwrap())
        });
    }
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("fdmt_execute");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for (nchans, nsamps) in [(256usize, 4096usize), (1024, 4096), (1024, 16384)] {
        let fdmt = Fdmt::new(lband(nchans, nsamps)).unwrap();
        let data = noise(nchans * nsamps);
        let waterfall = Waterfall::new(&data, nchans, nsamps).unwrap();
        group.throughput(Throughput::Elements((nchans * nsamps) as u64));
        group.bench_with_input(
            BenchmarkId::new("default_pool", format!("{nchans}x{nsamps}")),
            &waterfall,
            |b, waterfall| b.iter(|| fdmt.execute(black_box(waterfall)).unwrap()),
        );
    }
    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("fdmt_threads");
    group.sample_size(20);
    let (nchans, nsamps) = (1024usize, 8192usize);
    let fdmt = Fdmt::new(lband(nchans, nsamps)).unwrap();
    let data = noise(nchans * nsamps);
    let waterfall = Waterfall::new(&data, nchans, nsamps).unwrap();

    for nthreads in [1usize, 2, 4, 8] {
        set_num_threads(nthreads);
        group.bench_with_input(BenchmarkId::from_parameter(nthreads), &waterfall, |b, waterfall| {
            b.iter(|| fdmt.execute(black_box(waterfall)).unwrap())
        });
    }
    set_num_threads(0);
    group.finish();
}

criterion_group!(benches, bench_plan, bench_execute, bench_threads);
criterion_main!(benches);
