//! Cache maintenance commands.

use crate::display::format_bytes;
use anyhow::{Context, Result};
use tickvault_lib::prelude::*;

/// Remove expired cache entries.
pub(crate) async fn cleanup(service: &MarketDataService) -> Result<()> {
    let removed = service.cache().cleanup().await?;
    println!("Removed {removed} expired entries");
    Ok(())
}

/// Show cache statistics.
pub(crate) async fn show_stats(service: &MarketDataService) -> Result<()> {
    let cache = service.cache();
    let stats = cache.get_stats().await?;
    println!(
        "Memory: {} entries, {} of {}",
        stats.memory_count,
        format_bytes(stats.memory_size),
        format_bytes(cache.config().max_memory_bytes),
    );
    println!("Disk:   {} entries, {}", stats.disk_count, format_bytes(stats.disk_size));
    Ok(())
}

/// Remove every cache entry, or those whose key matches `pattern`.
pub(crate) async fn clear(service: &MarketDataService, pattern: Option<&str>) -> Result<()> {
    let cache = service.cache();
    match pattern {
        Some(pattern) => {
            let pattern = KeyPattern::regex(pattern).context("Invalid key pattern")?;
            let removed = cache.invalidate(&pattern).await?;
            println!("Removed {removed} entries");
        }
        None => {
            cache.clear().await?;
            println!("Cache cleared");
        }
    }
    Ok(())
}
