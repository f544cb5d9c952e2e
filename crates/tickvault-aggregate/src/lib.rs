//! Candle aggregation engine for the tickvault market-data pipeline.
//!
//! This crate turns ticks into OHLC candles:
//!
//! - [`Candle`] - OHLC candle data structure
//! - [`CandleEngine`] - Closed history plus one forming candle, fed by live ticks
//! - [`aggregate_ticks`] - Order-independent batch aggregation
//! - [`resample_ohlc`] - Re-bucketing candles into a coarser timeframe
//! - [`calculate_heikin_ashi`] - Heikin-Ashi transform
//! - [`merge_historical_and_live`] - Cutover from a historical batch to a live feed

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod candle;
mod engine;
mod error;
mod transform;

pub use candle::Candle;
pub use engine::{CandleEngine, EngineConfig, EngineStats, TickUpdate, TimeframeChange};
pub use error::EngineError;
pub use transform::{aggregate_ticks, calculate_heikin_ashi, merge_historical_and_live, resample_ohlc};
