//! Error types for candle aggregation.

use thiserror::Error;

/// Errors raised by [`CandleEngine`](crate::CandleEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A live tick arrived before historical candles were loaded.
    #[error("candle engine for {symbol} is not initialized; load historical data first")]
    NotInitialized {
        /// Symbol of the engine.
        symbol: String,
    },
}
