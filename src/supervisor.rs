//! Wires every component together and owns the cancellation handle. Runs
//! backfill, opens the live subscription, then forwards trades to the pool
//! until cancelled.

use crate::aggregator::CandleAggregator;
use crate::backfill::BackfillDriver;
use crate::config::AppConfig;
use crate::error::CollectorError;
use crate::exchange::ExchangeClient;
use crate::metrics::Metrics;
use crate::queue::TradeQueue;
use crate::store::{KlineStore, TradeStore, open_pool};
use crate::worker_pool::WorkerPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Supervisor {
    config: AppConfig,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(config: AppConfig, cancel: CancellationToken) -> Self {
        Supervisor {
            config,
            metrics: Metrics::new(),
            cancel,
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    pub async fn run(self) -> Result<(), CollectorError> {
        let pool = open_pool(&self.config.database.sqlite_path())?;
        let kline_store = KlineStore::new(pool.clone());
        let trade_store = TradeStore::new(pool);

        let exchange = ExchangeClient::new(
            self.config.poloniex.rest_url.clone(),
            self.config.poloniex.ws_url.clone(),
            self.metrics.clone(),
        );

        let timeframes = self.config.timeframes();
        let pairs = self.config.poloniex.pairs.clone();

        let backfill = BackfillDriver::new(&exchange, &kline_store);
        let now_ms = chrono::Utc::now().timestamp_millis();
        backfill
            .run(&pairs, &timeframes, now_ms, self.config.backfill_anchor_ms())
            .await?;

        info!("worker pool starting");
        let (queue, receiver) = TradeQueue::bounded(self.config.worker.queue_capacity, self.metrics.clone());
        let aggregator = CandleAggregator::new(kline_store.clone(), timeframes);
        let workers = WorkerPool::start(
            self.config.worker.pool_size,
            receiver,
            trade_store.clone(),
            aggregator,
            self.metrics.clone(),
            self.cancel.clone(),
        );

        let mut trades = exchange.subscribe_trades(pairs, self.cancel.clone());

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("shutdown requested, draining worker pool");
                    break;
                }
                trade = trades.recv() => {
                    match trade {
                        Some(trade) => {
                            if !queue.submit(trade) {
                                warn!("failed to submit trade to worker pool: queue is full");
                            }
                        }
                        None => {
                            warn!("trade stream closed");
                            break;
                        }
                    }
                }
            }
        }

        drop(queue);
        workers.stop().await;
        Ok(())
    }
}
