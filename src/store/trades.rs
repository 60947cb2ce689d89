use super::pool::SqlitePool;
use crate::domain::{Side, Trade};
use crate::error::StoreError;
use rusqlite::params;

/// Raw trade store, deduplicated on `(tid, pair)`. Every call hops onto the
/// blocking pool since rusqlite is synchronous.
#[derive(Clone)]
pub struct TradeStore {
    pool: SqlitePool,
}

impl TradeStore {
    pub fn new(pool: SqlitePool) -> Self {
        TradeStore { pool }
    }

    /// Inserts `trade`; a duplicate `(tid, pair)` is a silent no-op.
    pub async fn insert(&self, trade: &Trade) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let trade = trade.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            insert_one(&conn, &trade)
        })
        .await
        .map_err(StoreError::from)?
    }

    /// Inserts every trade in `trades` in one connection checkout.
    pub async fn insert_batch(&self, trades: &[Trade]) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let trades = trades.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            for trade in &trades {
                insert_one(&conn, trade)?;
            }
            Ok(())
        })
        .await
        .map_err(StoreError::from)?
    }
}

fn insert_one(conn: &rusqlite::Connection, trade: &Trade) -> Result<(), StoreError> {
    let side = match trade.side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    };
    conn.execute(
        "INSERT OR IGNORE INTO trades (tid, pair, price, amount, side, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![trade.tid, trade.pair, trade.price, trade.amount, side, trade.timestamp],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_sqlite::SqliteConnectionManager;

    fn memory_store() -> TradeStore {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        super::super::pool::init_schema(&pool.get().unwrap()).unwrap();
        TradeStore::new(pool)
    }

    fn sample(tid: &str) -> Trade {
        Trade {
            tid: tid.to_string(),
            pair: "BTC_USDT".to_string(),
            price: 50_000.0,
            amount: 1.0,
            side: Side::Buy,
            timestamp: 1_676_548_234_000,
        }
    }

    #[tokio::test]
    async fn duplicate_tid_pair_is_a_no_op() {
        let store = memory_store();
        store.insert(&sample("abc")).await.unwrap();
        store.insert(&sample("abc")).await.unwrap();

        let conn = store.pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn distinct_tids_both_persist() {
        let store = memory_store();
        store.insert(&sample("abc")).await.unwrap();
        store.insert(&sample("def")).await.unwrap();

        let conn = store.pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
