use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of a trade on the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Full market snapshot from the market sync poller.
///
/// Invariant of the venue: `yes_price + no_price ≈ 1.0`. The divergence
/// detector treats a deviation beyond 10 cents as an anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub question: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub end_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Hours until the market resolves, negative if the end date has passed.
    pub fn hours_to_resolution(&self, now: DateTime<Utc>) -> Option<f64> {
        self.end_date
            .map(|end| (end - now).num_minutes() as f64 / 60.0)
    }
}

/// YES-price move reported by the market sync / price websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub market_id: String,
    pub question: String,
    pub old_price: f64,
    pub new_price: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Single venue trade from the whale tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub market_id: String,
    pub trader_address: String,
    pub side: TradeSide,
    pub size: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn trade_value(&self) -> f64 {
        self.size * self.price
    }

    /// Stable key for at-least-once dedup across redeliveries.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.market_id,
            self.trader_address,
            self.size,
            self.timestamp.timestamp_millis()
        )
    }
}

/// Top-of-book state from the order-book poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    pub market_id: String,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub bid_depth: f64,
    pub ask_depth: f64,
    pub imbalance_ratio: f64,
    pub timestamp: DateTime<Utc>,
}

impl OrderBookUpdate {
    pub fn new(
        market_id: String,
        best_bid: f64,
        best_ask: f64,
        bid_depth: f64,
        ask_depth: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let total = bid_depth + ask_depth;
        let imbalance_ratio = if total > 0.0 {
            (bid_depth - ask_depth) / total
        } else {
            0.0
        };
        Self {
            market_id,
            best_bid,
            best_ask,
            spread: best_ask - best_bid,
            bid_depth,
            ask_depth,
            imbalance_ratio,
            timestamp,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }

    pub fn total_depth(&self) -> f64 {
        self.bid_depth + self.ask_depth
    }
}

/// Market-relevant news item from the RSS poller.
///
/// `relevance` is the fraction of the market's keywords matched in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub market_id: String,
    pub headline: String,
    pub source: String,
    pub url: String,
    pub relevance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Spot price update from the crypto ticker stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoPrice {
    pub symbol: String,
    pub current_price: f64,
    pub price_24h_ago: f64,
    pub annual_volatility: f64,
    pub timestamp: DateTime<Utc>,
}
