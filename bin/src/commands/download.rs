//! Download command implementation.

use crate::display::{format_count, parse_date, percent_bar};
use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tickvault_lib::ProgressCallback;
use tickvault_lib::prelude::*;
use tracing::info;

/// Download a symbol's ticks into the local store.
pub(crate) async fn download(
    service: &MarketDataService,
    symbol: &str,
    start: Option<&str>,
    end: Option<&str>,
    quiet: bool,
) -> Result<()> {
    let end = match end {
        Some(s) => parse_date(s, "end")?,
        None => Utc::now().date_naive() - Duration::days(1),
    };
    let start = match start {
        Some(s) => parse_date(s, "start")?,
        None => end,
    };
    let range = DateRange::new(start, end)?;

    let downloads = service.downloads();
    let estimate = downloads.estimate(symbol, range);
    if !quiet {
        println!(
            "Downloading {symbol} {range} ({} days, ~{} ticks, {} confidence)",
            range.total_days(),
            format_count(estimate.estimated_ticks),
            estimate.confidence,
        );
    }

    let pb = percent_bar(quiet, symbol.to_string());
    let bar = pb.clone();
    let on_progress: ProgressCallback = Arc::new(move |task: &DownloadTask| {
        bar.set_position(task.progress.round() as u64);
        if let Some(day) = task.current_day() {
            bar.set_message(format!("{} {day}", task.symbol));
        }
    });

    let id = downloads.download_data(symbol, range, Some(on_progress));
    let Some(task) = downloads.wait_for_task(&id).await else {
        pb.abandon_with_message("cancelled");
        bail!("Download of {symbol} was cancelled");
    };

    if task.status == TaskStatus::Failed {
        pb.abandon_with_message("failed");
        bail!(
            "Download of {symbol} failed: {}",
            task.error.as_deref().unwrap_or("unknown error")
        );
    }
    pb.finish_with_message("done");
    info!(symbol, ticks = task.downloaded_ticks, skipped = task.days_skipped, "download finished");

    // Candles cached before the download no longer reflect the store.
    service.invalidate_candles(symbol).await?;

    if !quiet {
        println!(
            "Stored {} ticks over {} days ({} already stored)",
            format_count(task.downloaded_ticks),
            task.days_total - task.days_skipped,
            task.days_skipped,
        );
    }
    Ok(())
}
