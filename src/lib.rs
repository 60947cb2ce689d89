//! Trade ingestion and OHLCV candle aggregation for a streaming exchange
//! feed, with REST backfill to keep candles continuous across restarts.

pub mod aggregator;
pub mod backfill;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod metrics;
pub mod queue;
pub mod store;
pub mod supervisor;
pub mod worker_pool;
