//! Tick store and download pipeline benchmarks.
//!
//! Run with: `cargo bench --package tickvault-bench --bench pipeline_benchmark`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tickvault_bench::{SYMBOL, bench_date, bench_range, memory_service, synthetic_source, synthetic_ticks};
use tickvault_lib::{FileBackend, MemoryBackend, StorageBackend, TickStore, Timeframe};
use tokio::runtime::Runtime;

const TICKS_PER_DAY: usize = 50_000;

fn store_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ticks = synthetic_ticks(bench_date(0), TICKS_PER_DAY);
    let ticks = &ticks;

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(TICKS_PER_DAY as u64));

    group.bench_function("store_ticks/memory", |b| {
        b.to_async(&rt).iter(|| async move {
            let store = TickStore::open(Arc::new(MemoryBackend::new())).await.unwrap();
            store.store_ticks(SYMBOL, bench_date(0), ticks).await.unwrap();
        });
    });

    group.bench_function("store_ticks/file", |b| {
        b.to_async(&rt).iter(|| async move {
            let temp_dir = TempDir::new().unwrap();
            let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(temp_dir.path()).await.unwrap());
            let store = TickStore::open(backend).await.unwrap();
            store.store_ticks(SYMBOL, bench_date(0), ticks).await.unwrap();
        });
    });

    let temp_dir = TempDir::new().unwrap();
    let store = rt.block_on(async {
        let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(temp_dir.path()).await.unwrap());
        let store = TickStore::open(backend).await.unwrap();
        store.store_ticks(SYMBOL, bench_date(0), ticks).await.unwrap();
        store
    });
    let store = &store;
    group.bench_function("get_ticks/file", |b| {
        b.to_async(&rt)
            .iter(|| async move { store.get_ticks(SYMBOL, bench_range(1), None).await });
    });

    group.finish();
}

fn download_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("download");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for days in [1u32, 5] {
        group.throughput(Throughput::Elements(u64::from(days) * TICKS_PER_DAY as u64));
        group.bench_with_input(BenchmarkId::new("memory_source", days), &days, |b, &days| {
            b.to_async(&rt).iter(|| async move {
                let service = memory_service(synthetic_source(days, TICKS_PER_DAY)).await;
                let id = service.downloads().download_data(SYMBOL, bench_range(days), None);
                service.downloads().wait_for_task(&id).await
            });
        });
    }

    let service = rt.block_on(async {
        let service = memory_service(synthetic_source(1, TICKS_PER_DAY)).await;
        service
            .store()
            .store_ticks(SYMBOL, bench_date(0), &synthetic_ticks(bench_date(0), TICKS_PER_DAY))
            .await
            .unwrap();
        service
    });
    let service = &service;
    group.bench_function("load_candles/cold", |b| {
        b.to_async(&rt).iter(|| async move {
            service.cache().clear().await.unwrap();
            service.load_candles(SYMBOL, Timeframe::Minute1, 500).await
        });
    });

    group.finish();
}

criterion_group!(benches, store_benchmark, download_benchmark);
criterion_main!(benches);
