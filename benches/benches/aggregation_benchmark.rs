//! Candle aggregation benchmarks.
//!
//! Run with: `cargo bench --package tickvault-bench --bench aggregation_benchmark`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tickvault_bench::{SYMBOL, bench_date, synthetic_ticks};
use tickvault_lib::{
    CandleEngine, EngineConfig, Timeframe, aggregate_ticks, calculate_heikin_ashi, resample_ohlc,
};

fn aggregate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_ticks");

    for count in [10_000, 100_000] {
        let ticks = synthetic_ticks(bench_date(0), count);
        group.throughput(Throughput::Elements(count as u64));
        for timeframe in [Timeframe::Minute1, Timeframe::Hour1] {
            group.bench_with_input(BenchmarkId::new(timeframe.as_str(), count), &ticks, |b, ticks| {
                b.iter(|| aggregate_ticks(black_box(ticks), timeframe));
            });
        }
    }
    group.finish();
}

fn transform_benchmark(c: &mut Criterion) {
    let ticks = synthetic_ticks(bench_date(0), 100_000);
    let minutes = aggregate_ticks(&ticks, Timeframe::Minute1);

    let mut group = c.benchmark_group("transform");
    group.throughput(Throughput::Elements(minutes.len() as u64));
    group.bench_function("resample_1m_to_1h", |b| {
        b.iter(|| resample_ohlc(black_box(&minutes), Timeframe::Hour1));
    });
    group.bench_function("heikin_ashi", |b| {
        b.iter(|| calculate_heikin_ashi(black_box(&minutes)));
    });
    group.finish();
}

fn engine_benchmark(c: &mut Criterion) {
    let history = synthetic_ticks(bench_date(0), 100_000);
    let live = synthetic_ticks(bench_date(1), 10_000);

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(live.len() as u64));
    group.bench_function("process_tick", |b| {
        b.iter_batched(
            || {
                let mut engine = CandleEngine::new(SYMBOL, Timeframe::Minute1, EngineConfig::default());
                engine.load_historical(&history, 500);
                engine
            },
            |mut engine| {
                for tick in &live {
                    let _ = black_box(engine.process_tick(tick));
                }
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, aggregate_benchmark, transform_benchmark, engine_benchmark);
criterion_main!(benches);
