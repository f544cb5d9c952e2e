//! Symbols command implementation.

use crate::display::{format_count, parse_category};
use anyhow::{Context, Result};
use tickvault_lib::prelude::*;

/// List the symbols served by the history server, optionally by category.
pub(crate) async fn list_symbols(service: &MarketDataService, category: Option<&str>) -> Result<()> {
    let category = category.map(parse_category).transpose()?;
    let mut symbols = service
        .downloads()
        .source()
        .fetch_available_symbols()
        .await
        .context("Failed to fetch symbols")?;
    if let Some(category) = category {
        symbols.retain(|s| s.category == category);
    }

    if symbols.is_empty() {
        println!("No symbols found.");
        return Ok(());
    }

    println!("{:<15} {:<10} {:<12} {:<12} {:>14}", "SYMBOL", "CATEGORY", "FROM", "TO", "TICKS");
    println!("{}", "-".repeat(67));
    for info in &symbols {
        println!(
            "{:<15} {:<10} {:<12} {:<12} {:>14}",
            info.symbol,
            info.category.to_string(),
            info.earliest_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            info.latest_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            format_count(info.tick_count),
        );
    }

    println!("\nTotal: {} symbols", symbols.len());
    Ok(())
}
