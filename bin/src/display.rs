//! Display utilities and output formatting for the tickvault CLI.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tickvault_lib::prelude::*;

/// Parse a `YYYY-MM-DD` date argument.
pub(crate) fn parse_date(s: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid {what} date: {s}"))
}

/// Parse a category string into a Category enum.
pub(crate) fn parse_category(s: &str) -> Result<Category> {
    match s.to_lowercase().as_str() {
        "forex" => Ok(Category::Forex),
        "metals" => Ok(Category::Metals),
        "energy" => Ok(Category::Energy),
        "crypto" => Ok(Category::Crypto),
        "other" => Ok(Category::Other),
        _ => bail!("Unknown category: {s}. Valid options: forex, metals, energy, crypto, other"),
    }
}

/// Create a progress bar over percent, hidden in quiet mode.
pub(crate) fn percent_bar(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(message);
    pb
}

/// Format a millisecond timestamp as UTC.
pub(crate) fn format_timestamp(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| timestamp_ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Format a byte count with binary units.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Format a count with thousands separators.
pub(crate) fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print candles as a table.
pub(crate) fn print_candles(candles: &[Candle]) {
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12} {:>10} {:>7}",
        "TIME (UTC)", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME", "TICKS"
    );
    println!("{}", "-".repeat(91));
    for candle in candles {
        println!(
            "{:<20} {:>12.5} {:>12.5} {:>12.5} {:>12.5} {:>10.0} {:>7}",
            format_timestamp(candle.bucket_start_ms),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
            candle.tick_count,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.0 MiB");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_768_867_200_000), "2026-01-20 00:00:00");
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_date("2026-01-20", "start").is_ok());
        assert!(parse_date("20-01-2026", "start").is_err());
        assert_eq!(parse_category("Metals").unwrap(), Category::Metals);
        assert!(parse_category("bonds").is_err());
    }
}
