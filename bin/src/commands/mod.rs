//! Command implementations for the tickvault CLI.

pub(crate) mod cache;
pub(crate) mod candles;
pub(crate) mod clear;
pub(crate) mod download;
pub(crate) mod info;
pub(crate) mod stats;
pub(crate) mod symbols;
