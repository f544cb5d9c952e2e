//! tickvault CLI - Historical tick data store and candle builder.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tickvault_lib::prelude::*;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "tickvault")]
#[command(about = "Historical tick data store and candle builder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory. Overrides the configuration file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// History server base URL. Overrides the configuration file.
    #[arg(long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download ticks into the local store
    Download {
        /// Symbol (e.g., EURUSD)
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to the end date.
        #[arg(short, long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to yesterday.
        #[arg(short, long)]
        end: Option<String>,

        /// Maximum concurrent downloads
        #[arg(long)]
        concurrency: Option<usize>,

        /// Refetch days that hold ticks but never finished downloading
        #[arg(long)]
        refetch_partial: bool,
    },

    /// Print candles built from stored ticks
    Candles {
        /// Symbol (e.g., EURUSD)
        symbol: String,

        /// Timeframe (1m, 5m, 15m, 1h, 4h, 1d)
        #[arg(short, long, default_value = "1h")]
        timeframe: String,

        /// Number of candles
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Print Heikin-Ashi candles
        #[arg(long)]
        heikin_ashi: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List symbols served by the history server
    Symbols {
        /// Filter by category (forex, metals, energy, crypto, other)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show server and local information about a symbol
    Info {
        /// Symbol (e.g., EURUSD)
        symbol: String,
    },

    /// Show local storage statistics
    Stats,

    /// List stored days of a symbol
    Dates {
        /// Symbol (e.g., EURUSD)
        symbol: String,
    },

    /// Manage the candle cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Delete stored ticks
    Clear {
        /// Symbol to clear
        symbol: Option<String>,

        /// Only this day (YYYY-MM-DD)
        #[arg(long, requires = "symbol")]
        date: Option<String>,

        /// Clear every symbol
        #[arg(long, conflicts_with = "symbol")]
        all: bool,
    },
}

/// Actions for managing the cache.
#[derive(Subcommand)]
enum CacheAction {
    /// Remove expired entries
    Cleanup,

    /// Show cache statistics
    Stats,

    /// Remove entries (all, or those matching a pattern)
    Clear {
        /// Regular expression selecting keys
        #[arg(long)]
        pattern: Option<String>,
    },
}

/// Installs the log subscriber. `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config =
        PipelineConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    if let Some(server) = &cli.server {
        config.server.base_url.clone_from(server);
    }
    Ok(config)
}

async fn open_service(config: PipelineConfig) -> Result<MarketDataService> {
    let source = HttpTickSource::new(config.server.client_config())
        .context("Failed to create HTTP client")?;
    MarketDataService::open(config, Arc::new(source))
        .await
        .context("Failed to open data directory")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut config = load_config(&cli)?;

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Download {
            symbol,
            start,
            end,
            concurrency,
            refetch_partial,
        } => {
            if let Some(concurrency) = concurrency {
                config.download = config.download.with_max_concurrent_downloads(concurrency);
            }
            if refetch_partial {
                config.download = config.download.with_skip_partial_days(false);
            }
            let service = open_service(config).await?;
            commands::download::download(&service, &symbol, start.as_deref(), end.as_deref(), cli.quiet).await
        }
        Commands::Candles {
            symbol,
            timeframe,
            limit,
            heikin_ashi,
            json,
        } => {
            let service = open_service(config).await?;
            commands::candles::candles(&service, &symbol, &timeframe, limit, heikin_ashi, json).await
        }
        Commands::Symbols { category } => {
            let service = open_service(config).await?;
            commands::symbols::list_symbols(&service, category.as_deref()).await
        }
        Commands::Info { symbol } => {
            let service = open_service(config).await?;
            commands::info::show_info(&service, &symbol).await
        }
        Commands::Stats => {
            let service = open_service(config).await?;
            commands::stats::show_stats(&service);
            Ok(())
        }
        Commands::Dates { symbol } => {
            let service = open_service(config).await?;
            commands::stats::show_dates(&service, &symbol);
            Ok(())
        }
        Commands::Cache { action } => {
            let service = open_service(config).await?;
            match action {
                CacheAction::Cleanup => commands::cache::cleanup(&service).await,
                CacheAction::Stats => commands::cache::show_stats(&service).await,
                CacheAction::Clear { pattern } => commands::cache::clear(&service, pattern.as_deref()).await,
            }
        }
        Commands::Clear { symbol, date, all } => {
            let service = open_service(config).await?;
            commands::clear::clear(&service, symbol.as_deref(), date.as_deref(), all).await
        }
    }
}
