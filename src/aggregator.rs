//! Folds one trade into the active candle of every configured timeframe.

use crate::domain::{Kline, Timeframe, Trade, bucket};
use crate::error::CollectorError;
use crate::store::KlineStore;

#[derive(Clone)]
pub struct CandleAggregator {
    store: KlineStore,
    timeframes: Vec<Timeframe>,
}

impl CandleAggregator {
    pub fn new(store: KlineStore, timeframes: Vec<Timeframe>) -> Self {
        CandleAggregator { store, timeframes }
    }

    /// Merges `trade` into the bucket of every configured timeframe. A trade
    /// landing in a bucket older than the currently-latest persisted one
    /// (a late or reordered delivery) never merges into that newer row; it
    /// opens its own bucket instead.
    pub async fn apply(&self, trade: &Trade) -> Result<(), CollectorError> {
        for &tf in &self.timeframes {
            let (begin, _end) = bucket(trade.timestamp, tf);
            let existing = self.store.last(&trade.pair, tf).await?;

            let mut kline = match existing {
                Some(k) if k.utc_begin == begin => k,
                _ => Kline::open(&trade.pair, tf, begin, trade.price),
            };

            kline.merge_price(trade.price);
            kline.apply_volume(trade.side, trade.amount, trade.price);

            self.store.upsert(&kline).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use r2d2_sqlite::SqliteConnectionManager;

    fn memory_pool() -> crate::store::SqlitePool {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        crate::store::init_schema(&pool.get().unwrap()).unwrap();
        pool
    }

    fn aggregator_with_timeframes(tfs: Vec<Timeframe>) -> (CandleAggregator, KlineStore) {
        let pool = memory_pool();
        let store = KlineStore::new(pool);
        (CandleAggregator::new(store.clone(), tfs), store)
    }

    fn trade(price: f64, amount: f64, side: Side, ts: i64) -> Trade {
        Trade {
            tid: format!("{ts}"),
            pair: "BTC_USDT".into(),
            price,
            amount,
            side,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn first_trade_opens_a_candle_for_every_timeframe() {
        let (agg, store) = aggregator_with_timeframes(vec![Timeframe::Minute1, Timeframe::Hour1]);
        let t = trade(50_000.0, 1.5, Side::Buy, 1_676_548_234_000);
        agg.apply(&t).await.unwrap();

        let minute = store.last("BTC_USDT", Timeframe::Minute1).await.unwrap().unwrap();
        assert_eq!(minute.utc_begin, 1_676_548_200_000);
        assert_eq!(minute.o, 50_000.0);
        assert_eq!(minute.vbs.buy_base, 1.5);
        assert_eq!(minute.vbs.buy_quote, 75_000.0);

        let hour = store.last("BTC_USDT", Timeframe::Hour1).await.unwrap().unwrap();
        assert_eq!(hour.o, 50_000.0);
    }

    #[tokio::test]
    async fn second_trade_in_same_bucket_merges_high_low_and_replaces_close() {
        let (agg, store) = aggregator_with_timeframes(vec![Timeframe::Minute1]);
        agg.apply(&trade(50_000.0, 1.5, Side::Buy, 1_676_548_234_000)).await.unwrap();
        agg.apply(&trade(49_000.0, 2.0, Side::Sell, 1_676_548_250_000)).await.unwrap();

        let k = store.last("BTC_USDT", Timeframe::Minute1).await.unwrap().unwrap();
        assert_eq!(k.h, 50_000.0);
        assert_eq!(k.l, 49_000.0);
        assert_eq!(k.c, 49_000.0);
        assert_eq!(k.vbs.buy_base, 1.5);
        assert_eq!(k.vbs.sell_base, 2.0);
        assert_eq!(k.vbs.sell_quote, 98_000.0);
    }

    #[tokio::test]
    async fn trade_in_a_new_bucket_opens_a_fresh_candle() {
        let (agg, store) = aggregator_with_timeframes(vec![Timeframe::Minute1]);
        agg.apply(&trade(50_000.0, 1.0, Side::Buy, 1_676_548_234_000)).await.unwrap();
        agg.apply(&trade(51_000.0, 1.0, Side::Buy, 1_676_548_234_000 + 60_000)).await.unwrap();

        let k = store.last("BTC_USDT", Timeframe::Minute1).await.unwrap().unwrap();
        assert_eq!(k.o, 51_000.0);
        assert_eq!(k.utc_begin, 1_676_548_260_000);
    }

    #[tokio::test]
    async fn volume_totals_are_monotone_within_a_bucket() {
        let (agg, store) = aggregator_with_timeframes(vec![Timeframe::Minute1]);
        let ts = 1_676_548_234_000;
        let mut prev_total = 0.0;
        for i in 0..5 {
            agg.apply(&trade(50_000.0, 1.0, Side::Buy, ts + i)).await.unwrap();
            let k = store.last("BTC_USDT", Timeframe::Minute1).await.unwrap().unwrap();
            let total = k.vbs.buy_base + k.vbs.sell_base;
            assert!(total >= prev_total);
            prev_total = total;
        }
    }

    #[tokio::test]
    async fn late_trade_for_an_older_bucket_opens_its_own_candle_instead_of_merging_forward() {
        let (agg, store) = aggregator_with_timeframes(vec![Timeframe::Minute1]);
        // Advance to a later bucket first.
        agg.apply(&trade(50_000.0, 1.0, Side::Buy, 1_676_548_234_000 + 60_000)).await.unwrap();
        // A reordered trade arrives for the earlier bucket.
        agg.apply(&trade(40_000.0, 3.0, Side::Sell, 1_676_548_234_000)).await.unwrap();

        let older = store
            .last("BTC_USDT", Timeframe::Minute1)
            .await
            .unwrap()
            .unwrap();
        // `last` orders by utc_begin DESC, so the newer bucket still wins the
        // lookup; fetch the older one directly to check it was created.
        let range = store
            .range(
                "BTC_USDT",
                Timeframe::Minute1,
                1_676_548_200_000,
                1_676_548_260_000,
            )
            .await
            .unwrap();
        let old_bucket = range.iter().find(|k| k.utc_begin == 1_676_548_200_000).unwrap();
        assert_eq!(old_bucket.o, 40_000.0);
        assert_eq!(old_bucket.vbs.sell_base, 3.0);

        let newer_bucket = range.iter().find(|k| k.utc_begin == 1_676_548_260_000).unwrap();
        assert_eq!(newer_bucket.o, 50_000.0);
        assert_eq!(newer_bucket.vbs.sell_base, 0.0);
        assert_eq!(older.utc_begin, 1_676_548_260_000);
    }
}
