use super::wire::{self, InboundMessage};
use crate::domain::{Kline, Timeframe, Trade};
use crate::error::TransportError;
use crate::metrics::Metrics;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const INITIAL_DIAL_DELAY: Duration = Duration::from_secs(5);
const TRADE_BUFFER: usize = 1000;

/// REST history fetch plus a self-reconnecting WebSocket trade subscription.
pub struct ExchangeClient {
    rest_url: String,
    ws_url: String,
    http: reqwest::Client,
    metrics: Metrics,
}

impl ExchangeClient {
    pub fn new(rest_url: String, ws_url: String, metrics: Metrics) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds");
        ExchangeClient {
            rest_url,
            ws_url,
            http,
            metrics,
        }
    }

    /// Fetches historical candles for `pair`/`timeframe` between `start_ms`
    /// and `end_ms`, inclusive-exclusive per the exchange's own semantics.
    pub async fn fetch_history(
        &self,
        pair: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Kline>, TransportError> {
        let url = format!("{}/markets/{}/candles", self.rest_url, pair);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("interval", timeframe.as_exchange()),
                ("startTime", &start_ms.to_string()),
                ("endTime", &end_ms.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let rows: Vec<Vec<serde_json::Value>> = resp.json().await?;
        let mut klines = Vec::with_capacity(rows.len());
        for row in &rows {
            match wire::parse_history_row(row, pair) {
                Ok(mut k) => {
                    k.timeframe = timeframe;
                    klines.push(k);
                }
                Err(e) => {
                    warn!(pair, timeframe = %timeframe, error = %e, "skipping malformed history row");
                }
            }
        }
        Ok(klines)
    }

    /// Opens a persistent WebSocket trade subscription for `pairs` and
    /// returns a receiver fed by an internal reconnect loop. The loop runs
    /// until `cancel` fires.
    pub fn subscribe_trades(
        &self,
        pairs: Vec<String>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Trade> {
        let (tx, rx) = mpsc::channel(TRADE_BUFFER);
        let ws_url = self.ws_url.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            run_reconnect_loop(ws_url, pairs, tx, metrics, cancel).await;
        });
        rx
    }
}

async fn run_reconnect_loop(
    ws_url: String,
    pairs: Vec<String>,
    tx: mpsc::Sender<Trade>,
    metrics: Metrics,
    cancel: CancellationToken,
) {
    let mut first_attempt = true;
    loop {
        if cancel.is_cancelled() {
            return;
        }

        if !first_attempt {
            metrics.inc_reconnects();
        }
        first_attempt = false;

        match connect_and_read(&ws_url, &pairs, &tx, &metrics, &cancel).await {
            Ok(()) => return, // cancelled cleanly from within the session
            Err(e) => {
                warn!(error = %e, "exchange websocket session ended, reconnecting");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

async fn connect_and_read(
    ws_url: &str,
    pairs: &[String],
    tx: &mpsc::Sender<Trade>,
    metrics: &Metrics,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    debug!(url = ws_url, "connecting to exchange websocket");
    let connect_result = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        r = tokio_tungstenite::connect_async(ws_url) => r,
    };
    let (ws_stream, _) = match connect_result {
        Ok(v) => v,
        Err(e) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(INITIAL_DIAL_DELAY) => {}
            }
            return Err(e.into());
        }
    };
    info!(url = ws_url, "connected to exchange websocket");

    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::json!({
        "event": "subscribe",
        "channel": ["trades"],
        "symbols": pairs,
    });
    write.send(Message::Text(subscribe.to_string().into())).await?;

    // first frame is expected to be a subscription acknowledgement; unknown
    // ack shapes are logged and accepted rather than treated as fatal.
    if let Some(Ok(Message::Text(text))) = read.next().await {
        match serde_json::from_str::<wire::SubscribeAck>(&text) {
            Ok(_) => {}
            Err(_) => debug!("subscription ack had an unexpected shape, continuing"),
        }
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ping_interval.tick() => {
                tokio::time::timeout(Duration::from_secs(10), write.send(Message::Ping(Vec::new().into())))
                    .await
                    .map_err(|_| TransportError::Decode("ping write timed out".into()))??;
            }
            frame = tokio::time::timeout(READ_TIMEOUT, read.next()) => {
                let frame = frame.map_err(|_| TransportError::Decode("read deadline exceeded".into()))?;
                match frame {
                    Some(Ok(Message::Text(text))) => handle_frame(&text, tx, metrics).await,
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(TransportError::Decode("connection closed".into()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }
}

async fn handle_frame(text: &str, tx: &mpsc::Sender<Trade>, metrics: &Metrics) {
    let parsed: InboundMessage = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };
    let frame = match parsed {
        InboundMessage::Trades(f) if f.channel == "trades" => f,
        _ => return,
    };
    for wire_trade in frame.data {
        let trade = match wire_trade.into_trade() {
            Ok(t) => t,
            Err(_) => {
                metrics.inc_validation_errors();
                continue;
            }
        };
        if tx.try_send(trade).is_err() {
            metrics.inc_trades_dropped_ws();
        }
    }
}
