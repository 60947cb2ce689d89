//! Wire-format decoding, isolated from the connection state machine so a
//! future shape change only touches this module.

use crate::domain::{Side, Trade};
use crate::error::TransportError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubscribeAck {
    #[allow(dead_code)]
    pub event: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Trades(TradesFrame),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
pub struct TradesFrame {
    pub channel: String,
    pub data: Vec<WireTrade>,
}

#[derive(Debug, Deserialize)]
pub struct WireTrade {
    pub symbol: String,
    pub id: String,
    pub price: String,
    pub amount: String,
    #[serde(rename = "takerSide")]
    pub taker_side: String,
    #[serde(rename = "createTime")]
    pub create_time: i64,
}

impl WireTrade {
    pub fn into_trade(self) -> Result<Trade, crate::error::CollectorError> {
        let price: f64 = self
            .price
            .parse()
            .map_err(|_| crate::error::CollectorError::Validation(format!("bad price: {}", self.price)))?;
        let amount: f64 = self
            .amount
            .parse()
            .map_err(|_| crate::error::CollectorError::Validation(format!("bad amount: {}", self.amount)))?;
        let side: Side = self.taker_side.parse()?;
        Ok(Trade {
            tid: self.id,
            pair: self.symbol,
            price,
            amount,
            side,
            timestamp: self.create_time,
        })
    }
}

/// Parses one REST history row: `[open, high, low, close, quote_volume,
/// base_volume, trade_count, ?, ?, open_time_ms, close_time_ms, ?, begin_ms,
/// end_ms]`. Rows shorter than 14 columns are rejected.
pub fn parse_history_row(row: &[serde_json::Value], pair: &str) -> Result<crate::domain::Kline, TransportError> {
    if row.len() < 14 {
        return Err(TransportError::Decode(format!(
            "expected 14 columns, got {}",
            row.len()
        )));
    }
    let as_f64 = |v: &serde_json::Value| -> Result<f64, TransportError> {
        v.as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| v.as_f64())
            .ok_or_else(|| TransportError::Decode(format!("expected numeric string, got {v}")))
    };
    let as_i64 = |v: &serde_json::Value| -> Result<i64, TransportError> {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| TransportError::Decode(format!("expected integer, got {v}")))
    };

    let o = as_f64(&row[0])?;
    let h = as_f64(&row[1])?;
    let l = as_f64(&row[2])?;
    let c = as_f64(&row[3])?;
    let base_volume = as_f64(&row[5])?;
    let utc_begin = as_i64(&row[12])?;
    let utc_end = as_i64(&row[13])?;

    let mid = (o + c) / 2.0;
    let half = base_volume / 2.0;

    Ok(crate::domain::Kline {
        pair: pair.to_string(),
        timeframe: crate::domain::Timeframe::Minute1, // caller overwrites to the requested timeframe
        o,
        h,
        l,
        c,
        utc_begin,
        utc_end,
        vbs: crate::domain::VolumeBreakdown {
            buy_base: half,
            sell_base: half,
            buy_quote: half * mid,
            sell_quote: half * mid,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_trade_decodes_and_splits_sides() {
        let wire = WireTrade {
            symbol: "BTC_USDT".into(),
            id: "1".into(),
            price: "50000.5".into(),
            amount: "1.25".into(),
            taker_side: "buy".into(),
            create_time: 1_676_548_234_000,
        };
        let trade = wire.into_trade().unwrap();
        assert_eq!(trade.price, 50_000.5);
        assert_eq!(trade.side, Side::Buy);
    }

    #[test]
    fn wire_trade_rejects_bad_price() {
        let wire = WireTrade {
            symbol: "BTC_USDT".into(),
            id: "1".into(),
            price: "not-a-number".into(),
            amount: "1.25".into(),
            taker_side: "buy".into(),
            create_time: 1,
        };
        assert!(wire.into_trade().is_err());
    }

    #[test]
    fn history_row_splits_volume_fifty_fifty() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"["100","110","90","105","0","10","5",0,0,0,0,0,1676548200000,1676548260000]"#,
        )
        .unwrap();
        let k = parse_history_row(&row, "BTC_USDT").unwrap();
        assert_eq!(k.o, 100.0);
        assert_eq!(k.h, 110.0);
        assert_eq!(k.vbs.buy_base, 5.0);
        assert_eq!(k.vbs.sell_base, 5.0);
        assert_eq!(k.utc_begin, 1_676_548_200_000);
        assert_eq!(k.utc_end, 1_676_548_260_000);
    }

    #[test]
    fn history_row_rejects_short_rows() {
        let row: Vec<serde_json::Value> = serde_json::from_str(r#"["100"]"#).unwrap();
        assert!(parse_history_row(&row, "BTC_USDT").is_err());
    }
}
