//! Prints a timing table of the in-process pipeline.
//!
//! Run with: `cargo run --release --bin benchmark_table`

use tickvault_bench::{format_duration, run_pipeline};

const TICKS_PER_DAY: usize = 100_000;

#[tokio::main]
async fn main() {
    println!("{:<8} {:<20} {:>12} {:>16}", "DAYS", "STEP", "TIME", "ITEMS/S");
    println!("{}", "-".repeat(60));

    for days in [1, 5, 20] {
        for result in run_pipeline(days, TICKS_PER_DAY).await {
            println!(
                "{:<8} {:<20} {:>12} {:>16.0}",
                days,
                result.step,
                format_duration(result.duration),
                result.items_per_sec(),
            );
        }
    }
}
