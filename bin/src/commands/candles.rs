//! Candles command implementation.

use crate::display::print_candles;
use anyhow::{Context, Result};
use tickvault_lib::calculate_heikin_ashi;
use tickvault_lib::prelude::*;

/// Print the most recent candles of a symbol.
pub(crate) async fn candles(
    service: &MarketDataService,
    symbol: &str,
    timeframe: &str,
    limit: usize,
    heikin_ashi: bool,
    json: bool,
) -> Result<()> {
    let timeframe: Timeframe = timeframe.parse().context("Invalid timeframe")?;
    let mut candles = service.load_candles(symbol, timeframe, limit).await?;
    if heikin_ashi {
        candles = calculate_heikin_ashi(&candles);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&candles)?);
        return Ok(());
    }

    if candles.is_empty() {
        println!("No stored ticks for {symbol}. Run `tickvault download {symbol}` first.");
        return Ok(());
    }

    print_candles(&candles);
    println!("\n{} {timeframe} candles", candles.len());
    Ok(())
}
