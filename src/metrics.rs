//! In-process counters for drops, reconnects, and error rates.
//!
//! This is deliberately not a registry or an exporter — no HTTP surface, no
//! Prometheus client. Call [`Metrics::snapshot`] to log or assert on current
//! values.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Counters {
    trades_dropped_ws: AtomicU64,
    trades_dropped_queue: AtomicU64,
    reconnects: AtomicU64,
    store_errors: AtomicU64,
    validation_errors: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct Metrics(Arc<Counters>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub trades_dropped_ws: u64,
    pub trades_dropped_queue: u64,
    pub reconnects: u64,
    pub store_errors: u64,
    pub validation_errors: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_trades_dropped_ws(&self) {
        self.0.trades_dropped_ws.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_dropped_queue(&self) {
        self.0.trades_dropped_queue.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.0.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_errors(&self) {
        self.0.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_validation_errors(&self) {
        self.0.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            trades_dropped_ws: self.0.trades_dropped_ws.load(Ordering::Relaxed),
            trades_dropped_queue: self.0.trades_dropped_queue.load(Ordering::Relaxed),
            reconnects: self.0.reconnects.load(Ordering::Relaxed),
            store_errors: self.0.store_errors.load(Ordering::Relaxed),
            validation_errors: self.0.validation_errors.load(Ordering::Relaxed),
        }
    }
}
