//! Event topics connecting producers and consumers.
//!
//! The broker topology itself is external; in-process, each event type gets
//! its own broadcast channel and consumers subscribe by type. Lagged
//! receivers drop messages rather than block producers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::anomaly::{AnomalyDetected, AnomalyType, TradeSignal};
use crate::models::market::{
    CryptoPrice, MarketSnapshot, NewsItem, OrderBookUpdate, PriceChange, Trade,
};

/// Result summary of an auto-bet order placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetPlaced {
    pub bet_id: Uuid,
    pub market_id: String,
    pub signal: TradeSignal,
    pub stake: Decimal,
    pub anomaly_type: AnomalyType,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

pub struct EventBus {
    pub snapshots: broadcast::Sender<MarketSnapshot>,
    pub price_changes: broadcast::Sender<PriceChange>,
    pub trades: broadcast::Sender<Trade>,
    pub order_books: broadcast::Sender<OrderBookUpdate>,
    pub news: broadcast::Sender<NewsItem>,
    pub crypto_prices: broadcast::Sender<CryptoPrice>,
    pub anomalies: broadcast::Sender<AnomalyDetected>,
    pub bets: broadcast::Sender<BetPlaced>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: broadcast::channel(capacity).0,
            price_changes: broadcast::channel(capacity).0,
            trades: broadcast::channel(capacity).0,
            order_books: broadcast::channel(capacity).0,
            news: broadcast::channel(capacity).0,
            crypto_prices: broadcast::channel(capacity).0,
            anomalies: broadcast::channel(capacity).0,
            bets: broadcast::channel(capacity).0,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
