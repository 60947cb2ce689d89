//! N parallel consumers draining the trade queue. A single worker's error
//! is logged and never propagates to its siblings or the pool.

use crate::aggregator::CandleAggregator;
use crate::domain::Trade;
use crate::metrics::Metrics;
use crate::queue::TradeQueueReceiver;
use crate::store::TradeStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_workers` tasks sharing one receiver behind a mutex, each
    /// looping until the channel closes or `cancel` fires.
    pub fn start(
        num_workers: usize,
        receiver: TradeQueueReceiver,
        trade_store: TradeStore,
        aggregator: CandleAggregator,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> Self {
        let rx = Arc::new(Mutex::new(receiver.rx));
        let mut handles = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let rx = Arc::clone(&rx);
            let trade_store = trade_store.clone();
            let aggregator = aggregator.clone();
            let metrics = metrics.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(id, rx, trade_store, aggregator, metrics, cancel).await;
            }));
        }
        WorkerPool { handles }
    }

    /// Waits for every worker to finish draining. Workers observe channel
    /// closure or cancellation on their own; this just joins them.
    pub async fn stop(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<tokio::sync::mpsc::Receiver<Trade>>>,
    trade_store: TradeStore,
    aggregator: CandleAggregator,
    metrics: Metrics,
    cancel: CancellationToken,
) {
    loop {
        let trade = {
            let mut guard = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                trade = guard.recv() => trade,
            }
        };
        let Some(trade) = trade else { return };

        if let Err(e) = handle_trade(&trade_store, &aggregator, &trade).await {
            warn!(worker = id, pair = %trade.pair, error = %e, "error processing trade");
            metrics.inc_store_errors();
        }
    }
}

async fn handle_trade(
    trade_store: &TradeStore,
    aggregator: &CandleAggregator,
    trade: &Trade,
) -> Result<(), crate::error::CollectorError> {
    trade_store.insert(trade).await?;
    aggregator.apply(trade).await?;
    Ok(())
}
