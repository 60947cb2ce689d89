//! Error taxonomy shared across the pipeline.
//!
//! The live ingestion path tolerates `Validation` and `Store` errors at
//! per-trade granularity; startup (backfill, DB connect) treats `Transport`
//! and `Store` as fatal. `Cancel` unwinds cleanly and is never logged as an
//! error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancel,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),

    #[error("blocking store task panicked: {0}")]
    Task(#[from] tokio::task::JoinError),
}
