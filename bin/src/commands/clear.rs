//! Clear command implementation.

use crate::display::parse_date;
use anyhow::{Result, bail};
use tickvault_lib::prelude::*;

/// Delete stored ticks of one day, one symbol, or everything.
pub(crate) async fn clear(
    service: &MarketDataService,
    symbol: Option<&str>,
    date: Option<&str>,
    all: bool,
) -> Result<()> {
    let store = service.store();
    match (symbol, date) {
        (Some(symbol), Some(date)) => {
            let date = parse_date(date, "clear")?;
            if store.delete_ticks(symbol, date).await? {
                println!("Deleted {symbol} {date}");
            } else {
                println!("Nothing stored for {symbol} {date}");
            }
            service.invalidate_candles(symbol).await?;
        }
        (Some(symbol), None) => {
            let days = store.clear_symbol(symbol).await?;
            service.invalidate_candles(symbol).await?;
            println!("Deleted {days} days of {symbol}");
        }
        (None, _) if all => {
            store.clear_all().await?;
            service.cache().clear().await?;
            println!("Deleted all stored ticks");
        }
        (None, _) => bail!("Specify a symbol or --all"),
    }
    Ok(())
}
