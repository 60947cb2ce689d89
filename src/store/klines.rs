use super::pool::SqlitePool;
use crate::domain::{Kline, Timeframe, VolumeBreakdown};
use crate::error::StoreError;
use rusqlite::{OptionalExtension, params};

/// Idempotent candle store. The sole write path is [`KlineStore::upsert`];
/// every other component, live or backfill, goes through it. Every call
/// hops onto the blocking pool since rusqlite is synchronous.
#[derive(Clone)]
pub struct KlineStore {
    pool: SqlitePool,
}

impl KlineStore {
    pub fn new(pool: SqlitePool) -> Self {
        KlineStore { pool }
    }

    /// Inserts `kline` if its bucket doesn't exist yet, otherwise merges:
    /// `h = max(h, new.h)`, `l = min(l, new.l)`, `c = new.c`. `o` is bound
    /// only on insert and never touched by the conflict branch.
    pub async fn upsert(&self, kline: &Kline) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let kline = kline.clone();
        tokio::task::spawn_blocking(move || upsert_blocking(&pool, &kline))
            .await
            .map_err(StoreError::from)?
    }

    /// Returns the candle with the greatest `utc_begin` for `(pair, timeframe)`.
    pub async fn last(&self, pair: &str, timeframe: Timeframe) -> Result<Option<Kline>, StoreError> {
        let pool = self.pool.clone();
        let pair = pair.to_string();
        tokio::task::spawn_blocking(move || last_blocking(&pool, &pair, timeframe))
            .await
            .map_err(StoreError::from)?
    }

    /// Returns candles with `utc_begin >= from` and `utc_end <= to`, ascending.
    pub async fn range(
        &self,
        pair: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> Result<Vec<Kline>, StoreError> {
        let pool = self.pool.clone();
        let pair = pair.to_string();
        tokio::task::spawn_blocking(move || range_blocking(&pool, &pair, timeframe, from, to))
            .await
            .map_err(StoreError::from)?
    }
}

fn upsert_blocking(pool: &SqlitePool, kline: &Kline) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO klines (
            pair, interval, o, h, l, c, utc_begin, utc_end,
            buy_base, sell_base, buy_quote, sell_quote, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, strftime('%s','now') * 1000)
        ON CONFLICT(pair, interval, utc_begin) DO UPDATE SET
            h = MAX(h, excluded.h),
            l = MIN(l, excluded.l),
            c = excluded.c,
            buy_base = excluded.buy_base,
            sell_base = excluded.sell_base,
            buy_quote = excluded.buy_quote,
            sell_quote = excluded.sell_quote,
            updated_at = strftime('%s','now') * 1000",
        params![
            kline.pair,
            kline.timeframe.as_exchange(),
            kline.o,
            kline.h,
            kline.l,
            kline.c,
            kline.utc_begin,
            kline.utc_end,
            kline.vbs.buy_base,
            kline.vbs.sell_base,
            kline.vbs.buy_quote,
            kline.vbs.sell_quote,
        ],
    )?;
    Ok(())
}

fn last_blocking(pool: &SqlitePool, pair: &str, timeframe: Timeframe) -> Result<Option<Kline>, StoreError> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT pair, interval, o, h, l, c, utc_begin, utc_end,
                    buy_base, sell_base, buy_quote, sell_quote
             FROM klines
             WHERE pair = ?1 AND interval = ?2
             ORDER BY utc_begin DESC
             LIMIT 1",
            params![pair, timeframe.as_exchange()],
            row_to_kline,
        )
        .optional()?;
    Ok(row)
}

fn range_blocking(
    pool: &SqlitePool,
    pair: &str,
    timeframe: Timeframe,
    from: i64,
    to: i64,
) -> Result<Vec<Kline>, StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT pair, interval, o, h, l, c, utc_begin, utc_end,
                buy_base, sell_base, buy_quote, sell_quote
         FROM klines
         WHERE pair = ?1 AND interval = ?2 AND utc_begin >= ?3 AND utc_end <= ?4
         ORDER BY utc_begin ASC",
    )?;
    let rows = stmt
        .query_map(params![pair, timeframe.as_exchange(), from, to], row_to_kline)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_kline(row: &rusqlite::Row) -> rusqlite::Result<Kline> {
    let interval: String = row.get(1)?;
    let timeframe = Timeframe::from_exchange(&interval).unwrap_or(Timeframe::Minute1);
    Ok(Kline {
        pair: row.get(0)?,
        timeframe,
        o: row.get(2)?,
        h: row.get(3)?,
        l: row.get(4)?,
        c: row.get(5)?,
        utc_begin: row.get(6)?,
        utc_end: row.get(7)?,
        vbs: VolumeBreakdown {
            buy_base: row.get(8)?,
            sell_base: row.get(9)?,
            buy_quote: row.get(10)?,
            sell_quote: row.get(11)?,
        },
    })
}
