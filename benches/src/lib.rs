//! Benchmark utilities for tickvault.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickvault_lib::{
    DateRange, MarketDataService, MemoryBackend, MemoryTickSource, PipelineConfig, TickRecord, Timeframe,
    day_start_ms,
};

/// Symbol used by every benchmark.
pub const SYMBOL: &str = "EURUSD";

/// Result of a single benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Name of the measured step.
    pub step: String,
    /// Wall time of the step.
    pub duration: Duration,
    /// Items (ticks or candles) processed by the step.
    pub items: u64,
}

impl BenchmarkResult {
    /// Items processed per second.
    pub fn items_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 { self.items as f64 / secs } else { 0.0 }
    }
}

/// First benchmark day; `day` offsets from it.
pub fn bench_date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap_or_default() + chrono::Duration::days(i64::from(day))
}

/// `count` ticks spread evenly over one day, mid price drifting in a sawtooth.
pub fn synthetic_ticks(date: NaiveDate, count: usize) -> Vec<TickRecord> {
    let start = day_start_ms(date);
    let step = 86_400_000 / count.max(1) as u64;
    (0..count as u64)
        .map(|i| {
            let bid = 1.04 + (i % 500) as f64 * 0.00001;
            TickRecord::new(SYMBOL, start + i * step, bid, bid + 0.00002, 1.0)
        })
        .collect()
}

/// A tick source serving `days` days of synthetic ticks.
pub fn synthetic_source(days: u32, ticks_per_day: usize) -> MemoryTickSource {
    let source = MemoryTickSource::new().with_chunk_size(10_000);
    for day in 0..days {
        source.insert_ticks(synthetic_ticks(bench_date(day), ticks_per_day));
    }
    source
}

/// A service over in-memory storage and a synthetic source.
pub async fn memory_service(source: MemoryTickSource) -> MarketDataService {
    let service = MarketDataService::with_backends(
        PipelineConfig::default(),
        Arc::new(MemoryBackend::new()),
        Arc::new(MemoryBackend::new()),
        Arc::new(source),
    )
    .await;
    match service {
        Ok(service) => service,
        Err(e) => panic!("in-memory service failed to open: {e}"),
    }
}

/// The range covering `days` benchmark days.
pub fn bench_range(days: u32) -> DateRange {
    match DateRange::new(bench_date(0), bench_date(days.saturating_sub(1))) {
        Ok(range) => range,
        Err(e) => panic!("invalid benchmark range: {e}"),
    }
}

/// Download `days` days, then build candles cold and warm.
pub async fn run_pipeline(days: u32, ticks_per_day: usize) -> Vec<BenchmarkResult> {
    let service = memory_service(synthetic_source(days, ticks_per_day)).await;
    let total_ticks = u64::from(days) * ticks_per_day as u64;
    let mut results = Vec::new();

    let start = Instant::now();
    let id = service.downloads().download_data(SYMBOL, bench_range(days), None);
    service.downloads().wait_for_task(&id).await;
    results.push(BenchmarkResult {
        step: "download".to_string(),
        duration: start.elapsed(),
        items: total_ticks,
    });

    for (step, timeframe) in [("candles 1m (cold)", Timeframe::Minute1), ("candles 1m (warm)", Timeframe::Minute1)] {
        let start = Instant::now();
        let candles = service.load_candles(SYMBOL, timeframe, 1_000).await.unwrap_or_default();
        results.push(BenchmarkResult {
            step: step.to_string(),
            duration: start.elapsed(),
            items: candles.len() as u64,
        });
    }

    results
}

/// Format duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        format!("{:.0}us", secs * 1_000_000.0)
    } else if secs < 1.0 {
        format!("{:.1}ms", secs * 1000.0)
    } else {
        format!("{secs:.2}s")
    }
}
