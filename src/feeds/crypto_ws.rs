//! Crypto ticker WebSocket worker.
//!
//! Consumes a combined stream of `{"stream": "...", "data": {"s": ..., "c":
//! ...}}` ticker envelopes and publishes `CryptoPrice` events. Reconnects
//! forever with a jittered 5-10s backoff.

use std::collections::HashMap;

use chrono::Utc;
use futures_util::StreamExt;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::models::market::CryptoPrice;

const RECONNECT_BASE_SECS: u64 = 5;
const RECONNECT_JITTER_SECS: u64 = 5;

/// Default annualised volatility per symbol, used until a better estimate
/// is configured.
fn default_volatilities() -> HashMap<String, f64> {
    [
        ("BTC", 0.55),
        ("ETH", 0.70),
        ("SOL", 0.95),
        ("XRP", 0.85),
        ("DOGE", 1.10),
        ("MATIC", 1.00),
        ("SUI", 1.20),
    ]
    .into_iter()
    .map(|(s, v)| (s.to_string(), v))
    .collect()
}

#[derive(Debug, Clone)]
pub struct CryptoFeedConfig {
    pub ws_url: String,
    pub streams: Vec<String>,
}

impl Default for CryptoFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://stream.binance.com:9443".into(),
            streams: vec![
                "btcusdt@ticker".into(),
                "ethusdt@ticker".into(),
                "solusdt@ticker".into(),
                "xrpusdt@ticker".into(),
                "dogeusdt@ticker".into(),
                "suiusdt@ticker".into(),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct CombinedStreamMsg {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TickerMsg {
    /// Symbol, e.g. BTCUSDT.
    s: String,
    /// Last price.
    c: String,
    /// Open price of the 24h window, when the stream provides it.
    o: Option<String>,
}

pub struct CryptoTickerFeed {
    config: CryptoFeedConfig,
    volatilities: HashMap<String, f64>,
    prices_tx: broadcast::Sender<CryptoPrice>,
}

impl CryptoTickerFeed {
    pub fn new(config: CryptoFeedConfig, prices_tx: broadcast::Sender<CryptoPrice>) -> Self {
        Self {
            config,
            volatilities: default_volatilities(),
            prices_tx,
        }
    }

    /// Start the reconnecting WebSocket task.
    pub fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        let ws_url = format!(
            "{}/stream?streams={}",
            self.config.ws_url,
            self.config.streams.join("/")
        );
        let volatilities = self.volatilities.clone();
        let prices_tx = self.prices_tx.clone();

        tokio::spawn(async move {
            loop {
                info!("connecting to crypto ticker stream: {ws_url}");

                let conn = tokio::select! {
                    result = connect_async(&ws_url) => result,
                    _ = shutdown.recv() => {
                        info!("crypto feed shutdown");
                        return;
                    }
                };

                match conn {
                    Ok((ws_stream, _)) => {
                        info!("crypto ticker stream connected");
                        let (_, mut read) = ws_stream.split();

                        loop {
                            let msg = tokio::select! {
                                msg = read.next() => msg,
                                _ = shutdown.recv() => {
                                    info!("crypto feed shutdown");
                                    return;
                                }
                            };

                            match msg {
                                Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                                    Self::handle_message(&text, &volatilities, &prices_tx);
                                }
                                Some(Ok(_)) => {} // Ping/Pong/Binary/Close/Frame
                                Some(Err(e)) => {
                                    warn!("crypto WS error: {e}");
                                    break;
                                }
                                None => {
                                    warn!("crypto WS stream ended");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("crypto WS connection failed: {e}");
                    }
                }

                let backoff = RECONNECT_BASE_SECS
                    + rand::thread_rng().gen_range(0..=RECONNECT_JITTER_SECS);
                warn!("reconnecting crypto WS in {backoff}s");
                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            }
        });
    }

    fn handle_message(
        text: &str,
        volatilities: &HashMap<String, f64>,
        prices_tx: &broadcast::Sender<CryptoPrice>,
    ) {
        // Malformed payloads are skipped; the stream stays alive.
        let envelope: CombinedStreamMsg = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("unparseable crypto stream message: {e}");
                return;
            }
        };
        if !envelope.stream.contains("@ticker") {
            return;
        }
        let ticker: TickerMsg = match serde_json::from_value(envelope.data) {
            Ok(t) => t,
            Err(e) => {
                warn!("unparseable ticker payload: {e}");
                return;
            }
        };

        let Some(symbol) = Self::base_symbol(&ticker.s) else {
            debug!("unmapped ticker symbol {}", ticker.s);
            return;
        };
        let Ok(current_price) = ticker.c.parse::<f64>() else {
            warn!("bad ticker price {:?}", ticker.c);
            return;
        };
        let price_24h_ago = ticker
            .o
            .as_deref()
            .and_then(|o| o.parse::<f64>().ok())
            .unwrap_or(current_price);

        let price = CryptoPrice {
            symbol: symbol.to_string(),
            current_price,
            price_24h_ago,
            annual_volatility: volatilities.get(symbol).copied().unwrap_or(0.80),
            timestamp: Utc::now(),
        };
        let _ = prices_tx.send(price);
    }

    /// BTCUSDT → BTC. Only USDT-quoted tickers are mapped.
    fn base_symbol(ticker_symbol: &str) -> Option<&str> {
        ticker_symbol.strip_suffix("USDT")
    }
}
