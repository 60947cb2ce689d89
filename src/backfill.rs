//! Startup historical ingest. Resumes from the last persisted bucket per
//! `(pair, timeframe)`, or from the configured anchor if none exists. Every
//! error here is fatal: a silent gap on startup is worse than a crash.

use crate::domain::Timeframe;
use crate::error::CollectorError;
use crate::exchange::ExchangeClient;
use crate::store::KlineStore;
use futures_util::future::try_join_all;
use tracing::info;

pub struct BackfillDriver<'a> {
    exchange: &'a ExchangeClient,
    store: &'a KlineStore,
}

impl<'a> BackfillDriver<'a> {
    pub fn new(exchange: &'a ExchangeClient, store: &'a KlineStore) -> Self {
        BackfillDriver { exchange, store }
    }

    /// Runs one backfill pass over every `(pair, timeframe)` combination,
    /// concurrently, before the live subscription starts.
    pub async fn run(
        &self,
        pairs: &[String],
        timeframes: &[Timeframe],
        now_ms: i64,
        anchor_ms: i64,
    ) -> Result<(), CollectorError> {
        info!(pairs = pairs.len(), timeframes = timeframes.len(), "starting backfill");

        let mut tasks = Vec::new();
        for pair in pairs {
            for &tf in timeframes {
                tasks.push(self.backfill_one(pair, tf, now_ms, anchor_ms));
            }
        }
        try_join_all(tasks).await?;

        info!("backfill complete");
        Ok(())
    }

    async fn backfill_one(
        &self,
        pair: &str,
        timeframe: Timeframe,
        now_ms: i64,
        anchor_ms: i64,
    ) -> Result<(), CollectorError> {
        let from = match self.store.last(pair, timeframe).await? {
            Some(k) => k.utc_end,
            None => anchor_ms,
        };

        if from >= now_ms {
            info!(pair, timeframe = %timeframe, "no new data to backfill");
            return Ok(());
        }

        let klines = self.exchange.fetch_history(pair, timeframe, from, now_ms).await?;
        info!(pair, timeframe = %timeframe, count = klines.len(), "fetched historical candles");

        for kline in &klines {
            self.store.upsert(kline).await?;
        }

        Ok(())
    }
}
