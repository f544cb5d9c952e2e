//! Local storage statistics.

use crate::display::{format_bytes, format_count};
use tickvault_lib::prelude::*;

/// Show storage statistics for every stored symbol.
pub(crate) fn show_stats(service: &MarketDataService) {
    let stats = service.store().get_storage_stats();
    if stats.symbol_count == 0 {
        println!("No ticks stored in {}", service.config().data_dir.display());
        return;
    }

    println!("{:<15} {:<12} {:<12} {:>6} {:>14} {:>10}", "SYMBOL", "FROM", "TO", "DAYS", "TICKS", "SIZE");
    println!("{}", "-".repeat(74));
    for (symbol, s) in &stats.per_symbol {
        println!(
            "{:<15} {:<12} {:<12} {:>6} {:>14} {:>10}",
            symbol,
            s.first_date.to_string(),
            s.last_date.to_string(),
            s.days,
            format_count(s.tick_count),
            format_bytes(s.size_bytes),
        );
    }
    println!(
        "\nTotal: {} symbols, {} ticks, {}",
        stats.symbol_count,
        format_count(stats.tick_count),
        format_bytes(stats.total_size_bytes),
    );
}

/// List the stored days of a symbol.
pub(crate) fn show_dates(service: &MarketDataService, symbol: &str) {
    let store = service.store();
    let partitions = store.symbol_partitions(symbol);
    if partitions.is_empty() {
        println!("No days stored for {symbol}");
        return;
    }

    println!("{:<12} {:>10} {:>9}", "DATE", "TICKS", "COMPLETE");
    println!("{}", "-".repeat(33));
    for meta in &partitions {
        println!(
            "{:<12} {:>10} {:>9}",
            meta.date.to_string(),
            format_count(meta.tick_count),
            if store.is_complete(symbol, meta.date) { "yes" } else { "no" },
        );
    }
    println!("\n{} days", partitions.len());
}
