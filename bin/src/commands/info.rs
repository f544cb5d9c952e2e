//! Info command implementation.
//!
//! Shows what the history server knows about a symbol next to what is stored
//! locally, with tick estimates for common periods.

use crate::display::{format_bytes, format_count};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tickvault_lib::prelude::*;

/// Show server and local information about a symbol.
pub(crate) async fn show_info(service: &MarketDataService, symbol: &str) -> Result<()> {
    let info = service
        .downloads()
        .source()
        .fetch_symbol_info(symbol)
        .await
        .with_context(|| format!("Unknown symbol: {symbol}"))?;

    println!("Symbol:    {}", info.symbol);
    if let Some(name) = &info.display_name {
        println!("Name:      {name}");
    }
    println!("Category:  {}", info.category);
    if let (Some(from), Some(to)) = (info.earliest_date, info.latest_date) {
        println!("Available: {from} to {to} ({} days)", info.available_days);
    }
    if info.tick_count > 0 {
        println!("Ticks:     {}", format_count(info.tick_count));
    }

    let stats = service.store().get_storage_stats();
    match stats.per_symbol.get(symbol) {
        Some(local) => {
            println!("\nStored locally:");
            println!("  Days:  {} ({} to {})", local.days, local.first_date, local.last_date);
            println!("  Ticks: {}", format_count(local.tick_count));
            println!("  Size:  {}", format_bytes(local.size_bytes));
        }
        None => println!("\nNothing stored locally."),
    }

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    println!("\nDownload Estimates:");
    println!("{:<15} {:>14} {:>8} {:>12}", "PERIOD", "TICKS", "STORED", "CONFIDENCE");
    println!("{}", "-".repeat(52));
    for (label, days) in [("Last 1 day", 1), ("Last 1 week", 7), ("Last 1 month", 30)] {
        let Ok(range) = DateRange::new(yesterday - Duration::days(days - 1), yesterday) else {
            continue;
        };
        let estimate = service.downloads().estimate(symbol, range);
        println!(
            "{:<15} {:>14} {:>8} {:>12}",
            label,
            format_count(estimate.estimated_ticks),
            format!("{}/{}", estimate.stored_days, range.total_days()),
            estimate.confidence.to_string(),
        );
    }
    Ok(())
}
