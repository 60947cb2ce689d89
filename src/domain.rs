//! Core value types shared by every component: trades, candles, timeframes.

use serde::{Deserialize, Serialize};

/// One executed order match on a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub tid: String,
    pub pair: String,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::str::FromStr for Side {
    type Err = crate::error::CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" | "BUY" => Ok(Side::Buy),
            "sell" | "SELL" => Ok(Side::Sell),
            other => Err(crate::error::CollectorError::Validation(format!(
                "unknown trade side: {other}"
            ))),
        }
    }
}

/// Buy/sell base and quote volume accumulators for one candle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBreakdown {
    pub buy_base: f64,
    pub sell_base: f64,
    pub buy_quote: f64,
    pub sell_quote: f64,
}

/// Candle aggregated from trades for one `(pair, timeframe, utc_begin)` bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub pair: String,
    pub timeframe: Timeframe,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub utc_begin: i64,
    pub utc_end: i64,
    pub vbs: VolumeBreakdown,
}

impl Kline {
    /// Builds a fresh single-trade candle opening a bucket.
    pub fn open(pair: &str, timeframe: Timeframe, utc_begin: i64, price: f64) -> Self {
        let utc_end = utc_begin + timeframe.duration_ms();
        Kline {
            pair: pair.to_string(),
            timeframe,
            o: price,
            h: price,
            l: price,
            c: price,
            utc_begin,
            utc_end,
            vbs: VolumeBreakdown::default(),
        }
    }

    /// Folds one trade's price into an already-open candle. Never touches `o`.
    pub fn merge_price(&mut self, price: f64) {
        self.h = self.h.max(price);
        self.l = self.l.min(price);
        self.c = price;
    }

    pub fn apply_volume(&mut self, side: Side, amount: f64, price: f64) {
        match side {
            Side::Buy => {
                self.vbs.buy_base += amount;
                self.vbs.buy_quote += amount * price;
            }
            Side::Sell => {
                self.vbs.sell_base += amount;
                self.vbs.sell_quote += amount * price;
            }
        }
    }
}

/// Candle timeframe. Internal encoding is the short form (`1m`); storage and
/// the exchange wire protocol use the long form (`MINUTE_1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Minute1,
    Minute15,
    Hour1,
    Day1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Minute1,
        Timeframe::Minute15,
        Timeframe::Hour1,
        Timeframe::Day1,
    ];

    pub fn duration_ms(self) -> i64 {
        match self {
            Timeframe::Minute1 => 60_000,
            Timeframe::Minute15 => 15 * 60_000,
            Timeframe::Hour1 => 60 * 60_000,
            Timeframe::Day1 => 24 * 60 * 60_000,
        }
    }

    /// Short internal spelling, e.g. `1m`.
    pub fn as_short(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Day1 => "1d",
        }
    }

    /// Long exchange spelling, e.g. `MINUTE_1`, used on the wire and in storage.
    pub fn as_exchange(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "MINUTE_1",
            Timeframe::Minute15 => "MINUTE_15",
            Timeframe::Hour1 => "HOUR_1",
            Timeframe::Day1 => "DAY_1",
        }
    }

    pub fn from_short(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::Minute1),
            "15m" => Some(Timeframe::Minute15),
            "1h" => Some(Timeframe::Hour1),
            "1d" => Some(Timeframe::Day1),
            _ => None,
        }
    }

    pub fn from_exchange(s: &str) -> Option<Self> {
        match s {
            "MINUTE_1" => Some(Timeframe::Minute1),
            "MINUTE_15" => Some(Timeframe::Minute15),
            "HOUR_1" => Some(Timeframe::Hour1),
            "DAY_1" => Some(Timeframe::Day1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_short())
    }
}

/// Normalizes a timestamp that may be expressed in seconds or milliseconds to
/// milliseconds. Anything at or below 10^10 is assumed to be seconds.
fn normalize_to_ms(ts: i64) -> i64 {
    if ts.abs() <= 10_000_000_000 { ts * 1000 } else { ts }
}

/// Computes the `(utc_begin, utc_end)` bucket, in milliseconds, that a
/// timestamp falls into for a given timeframe. Buckets are floored on the UTC
/// wall clock, not on the raw epoch instant, so day buckets land on midnight.
pub fn bucket(ts: i64, timeframe: Timeframe) -> (i64, i64) {
    use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

    let ts_ms = normalize_to_ms(ts);
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ts_ms).single().expect("valid timestamp");

    let begin = match timeframe {
        Timeframe::Minute1 => dt
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .expect("valid truncation"),
        Timeframe::Minute15 => {
            let floored_minute = (dt.minute() / 15) * 15;
            dt.with_minute(floored_minute)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .expect("valid truncation")
        }
        Timeframe::Hour1 => dt
            .with_minute(0)
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .expect("valid truncation"),
        Timeframe::Day1 => Utc
            .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 0, 0, 0)
            .single()
            .expect("valid date"),
    };

    let begin_ms = begin.timestamp_millis();
    (begin_ms, begin_ms + timeframe.duration_ms())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_15m_floors_to_quarter_hour() {
        let (begin, end) = bucket(1_676_548_234, Timeframe::Minute15);
        assert_eq!(begin, 1_676_547_900_000);
        assert_eq!(end, 1_676_548_800_000);
    }

    #[test]
    fn bucket_1d_anchors_to_midnight_utc() {
        let (begin, end) = bucket(1_676_548_234_000, Timeframe::Day1);
        assert_eq!(begin, 1_676_505_600_000);
        assert_eq!(end, 1_676_592_000_000);
    }

    #[test]
    fn bucket_is_left_closed_right_open() {
        let tf = Timeframe::Minute1;
        let (begin, _) = bucket(1_676_548_234_000, tf);
        let (begin_at_last_ms, _) = bucket(begin + tf.duration_ms() - 1, tf);
        let (begin_at_next, _) = bucket(begin + tf.duration_ms(), tf);
        assert_eq!(begin, begin_at_last_ms);
        assert_ne!(begin, begin_at_next);
    }

    #[test]
    fn open_sets_ohlc_to_the_same_price() {
        let k = Kline::open("BTC_USDT", Timeframe::Minute1, 1_676_548_200_000, 50_000.0);
        assert_eq!(k.o, 50_000.0);
        assert_eq!(k.h, 50_000.0);
        assert_eq!(k.l, 50_000.0);
        assert_eq!(k.c, 50_000.0);
    }

    #[test]
    fn merge_price_never_touches_open() {
        let mut k = Kline::open("BTC_USDT", Timeframe::Minute1, 1_676_548_200_000, 50_000.0);
        k.merge_price(49_000.0);
        k.merge_price(50_500.0);
        assert_eq!(k.o, 50_000.0);
        assert_eq!(k.h, 50_500.0);
        assert_eq!(k.l, 49_000.0);
        assert_eq!(k.c, 50_500.0);
    }
}
