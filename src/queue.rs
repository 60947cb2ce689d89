//! Bounded FIFO between the exchange stream and the worker pool. Submission
//! never blocks: a full queue drops the trade.

use crate::domain::Trade;
use crate::metrics::Metrics;
use tokio::sync::mpsc;

pub struct TradeQueue {
    tx: mpsc::Sender<Trade>,
    metrics: Metrics,
}

pub struct TradeQueueReceiver {
    pub rx: mpsc::Receiver<Trade>,
}

impl TradeQueue {
    pub fn bounded(capacity: usize, metrics: Metrics) -> (Self, TradeQueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (TradeQueue { tx, metrics }, TradeQueueReceiver { rx })
    }

    /// Offers `trade` without blocking. Returns `false` if the queue is full;
    /// the caller decides whether that is worth logging.
    pub fn submit(&self, trade: Trade) -> bool {
        match self.tx.try_send(trade) {
            Ok(()) => true,
            Err(_) => {
                self.metrics.inc_trades_dropped_queue();
                false
            }
        }
    }
}

impl Clone for TradeQueue {
    fn clone(&self) -> Self {
        TradeQueue {
            tx: self.tx.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    fn sample() -> Trade {
        Trade {
            tid: "1".into(),
            pair: "BTC_USDT".into(),
            price: 1.0,
            amount: 1.0,
            side: Side::Buy,
            timestamp: 0,
        }
    }

    #[test]
    fn submit_past_capacity_drops_and_counts() {
        let metrics = Metrics::new();
        let (queue, _rx) = TradeQueue::bounded(4, metrics.clone());
        let mut accepted = 0;
        let mut rejected = 0;
        for _ in 0..10 {
            if queue.submit(sample()) {
                accepted += 1;
            } else {
                rejected += 1;
            }
        }
        assert_eq!(accepted, 4);
        assert_eq!(rejected, 6);
        assert_eq!(metrics.snapshot().trades_dropped_queue, 6);
    }
}
