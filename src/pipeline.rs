//! Consumer-side glue: routes each inbound stream through its detectors,
//! attaches a quality assessment, and publishes on the anomaly topic.
//!
//! Detector state is per-detector-locked so stream consumers can run
//! concurrently; within one stream, events are processed sequentially.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::caches::{
    AnomalySignalTracker, CryptoMarketCache, MarketNameResolver, SeenSet, SEEN_NEWS_FLUSH,
    SEEN_TRADES_FLUSH,
};
use crate::detectors::{
    CryptoDivergenceDetector, MarketDivergenceDetector, NewsImpactDetector,
    OrderBookImbalanceDetector, PriceSpikeDetector, SpreadDetector, VolumeSpikeDetector,
    WhaleDetector,
};
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected};
use crate::models::market::{
    CryptoPrice, MarketSnapshot, NewsItem, OrderBookUpdate, PriceChange, Trade,
};
use crate::pricing::matcher::CryptoMarketMatcher;
use crate::quality::{MarketType, QualityInput, QualityReport, QualityScorer};

/// Crypto edge signals carry their own assessment: the generic scorer's
/// multi-signal and 7-day gates don't apply to model-priced markets.
const CRYPTO_EDGE_SCORE: u32 = 70;
const CRYPTO_STRONG_EDGE_SCORE: u32 = 85;

pub struct AnomalyPipeline {
    price_spike: PriceSpikeDetector,
    volume_spike: Mutex<VolumeSpikeDetector>,
    whale: WhaleDetector,
    imbalance: Mutex<OrderBookImbalanceDetector>,
    spread: Mutex<SpreadDetector>,
    divergence: MarketDivergenceDetector,
    news: NewsImpactDetector,
    crypto: CryptoDivergenceDetector,
    matcher: CryptoMarketMatcher,
    pub crypto_markets: Arc<CryptoMarketCache>,
    pub resolver: Arc<MarketNameResolver>,
    signals: AnomalySignalTracker,
    seen_trades: SeenSet,
    seen_news: SeenSet,
    latest_snapshots: DashMap<String, MarketSnapshot>,
    anomalies_tx: broadcast::Sender<AnomalyDetected>,
}

impl AnomalyPipeline {
    pub fn new(anomalies_tx: broadcast::Sender<AnomalyDetected>) -> Self {
        Self {
            price_spike: PriceSpikeDetector::new(),
            volume_spike: Mutex::new(VolumeSpikeDetector::new()),
            whale: WhaleDetector::new(),
            imbalance: Mutex::new(OrderBookImbalanceDetector::new()),
            spread: Mutex::new(SpreadDetector::new()),
            divergence: MarketDivergenceDetector::new(),
            news: NewsImpactDetector::new(),
            crypto: CryptoDivergenceDetector::new(),
            matcher: CryptoMarketMatcher::new(),
            crypto_markets: Arc::new(CryptoMarketCache::new()),
            resolver: Arc::new(MarketNameResolver::new()),
            signals: AnomalySignalTracker::new(),
            seen_trades: SeenSet::new(SEEN_TRADES_FLUSH),
            seen_news: SeenSet::new(SEEN_NEWS_FLUSH),
            latest_snapshots: DashMap::new(),
            anomalies_tx,
        }
    }

    pub fn on_snapshot(&self, snapshot: &MarketSnapshot) -> Vec<AnomalyDetected> {
        self.resolver.record(&snapshot.market_id, &snapshot.question);
        self.latest_snapshots
            .insert(snapshot.market_id.clone(), snapshot.clone());

        if let Some(matched) = self.matcher.parse(&snapshot.question, Utc::now()) {
            self.crypto_markets.insert(snapshot.clone(), matched);
        }

        let mut out = Vec::new();
        if let Some(a) = self.volume_spike.lock().expect("detector lock").evaluate(snapshot) {
            out.push(a);
        }
        if let Some(a) = self.divergence.near_resolution(snapshot) {
            out.push(a);
        }
        if let Some(a) = self.divergence.price_sum(snapshot) {
            out.push(a);
        }
        self.publish_all(out)
    }

    pub fn on_price_change(&self, change: &PriceChange) -> Vec<AnomalyDetected> {
        self.resolver.record(&change.market_id, &change.question);
        let out = self.price_spike.evaluate(change).into_iter().collect();
        self.publish_all(out)
    }

    pub fn on_trade(&self, trade: &Trade) -> Vec<AnomalyDetected> {
        if !self.seen_trades.insert_new(&trade.dedup_key()) {
            debug!("duplicate trade delivery for {}", trade.market_id);
            return Vec::new();
        }
        let out = self.whale.evaluate(trade).into_iter().collect();
        self.publish_all(out)
    }

    pub fn on_order_book(&self, book: &OrderBookUpdate) -> Vec<AnomalyDetected> {
        let mut out = Vec::new();
        if let Some(a) = self.imbalance.lock().expect("detector lock").evaluate(book) {
            out.push(a);
        }
        if let Some(a) = self.spread.lock().expect("detector lock").evaluate(book) {
            out.push(a);
        }
        self.publish_all(out)
    }

    pub fn on_news(&self, item: &NewsItem) -> Vec<AnomalyDetected> {
        if !self.seen_news.insert_new(&item.url) {
            debug!("duplicate news link {}", item.url);
            return Vec::new();
        }
        let out = self.news.evaluate(item).into_iter().collect();
        self.publish_all(out)
    }

    pub fn on_crypto_price(&self, price: &CryptoPrice) -> Vec<AnomalyDetected> {
        let now = Utc::now();
        let mut out = Vec::new();
        for cached in self.crypto_markets.for_symbol(&price.symbol) {
            if let Some(a) = self
                .crypto
                .evaluate(price, &cached.snapshot, &cached.matched, now)
            {
                out.push(a);
            }
        }
        self.publish_all(out)
    }

    /// Record, score, and publish each anomaly.
    fn publish_all(&self, anomalies: Vec<AnomalyDetected>) -> Vec<AnomalyDetected> {
        let now = Utc::now();
        let enriched: Vec<AnomalyDetected> = anomalies
            .into_iter()
            .map(|mut anomaly| {
                self.signals
                    .record(&anomaly.market_id, anomaly.anomaly_type, now);
                anomaly.quality = Some(self.assess(&anomaly));
                anomaly
            })
            .collect();

        for anomaly in &enriched {
            // Send fails only when nobody subscribes, which is fine.
            let _ = self.anomalies_tx.send(anomaly.clone());
        }
        enriched
    }

    fn assess(&self, anomaly: &AnomalyDetected) -> QualityReport {
        let now = Utc::now();

        if let AnomalyDetails::CryptoEdge {
            edge,
            strong_edge,
            days_to_expiry,
            ..
        } = &anomaly.details
        {
            let score = if *strong_edge {
                CRYPTO_STRONG_EDGE_SCORE
            } else {
                CRYPTO_EDGE_SCORE
            };
            return QualityReport {
                score,
                market_type: MarketType::PriceBinary,
                hours_to_resolution: Some(days_to_expiry * 24.0),
                reasons: vec![format!(
                    "model edge {:.0}c{} (+{score})",
                    edge.abs() * 100.0,
                    if *strong_edge { ", strong" } else { "" },
                )],
                blocks: vec![],
            };
        }

        match self.latest_snapshots.get(&anomaly.market_id) {
            Some(snapshot) => QualityScorer::assess(
                &QualityInput {
                    question: &snapshot.question,
                    category: snapshot.category.as_deref(),
                    end_date: snapshot.end_date,
                    volume: snapshot.volume_24h,
                    anomaly_signal_count: self.signals.signal_count(&anomaly.market_id, now),
                    has_news_catalyst: self.signals.has_news_catalyst(&anomaly.market_id, now),
                },
                now,
            ),
            None => {
                // No metadata yet — unscoreable, and the dispatcher will drop it.
                QualityReport {
                    score: 0,
                    market_type: MarketType::Unknown,
                    hours_to_resolution: None,
                    reasons: vec![],
                    blocks: vec!["no market metadata yet".into()],
                }
            }
        }
    }
}
