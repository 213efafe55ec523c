//! Concurrent-safe caches shared between consumer tasks.
//!
//! Readers may see slightly stale entries; every unbounded collection has a
//! flush threshold so long-running processes stay bounded.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::models::anomaly::AnomalyType;
use crate::models::market::MarketSnapshot;
use crate::pricing::matcher::CryptoMarketMatch;

pub const SEEN_TRADES_FLUSH: usize = 10_000;
pub const SEEN_NEWS_FLUSH: usize = 5_000;
const SIGNAL_WINDOW_MINUTES: i64 = 60;
const MAX_COUNTED_SIGNALS: u32 = 5;

/// A crypto market snapshot joined with its parsed question match.
#[derive(Debug, Clone)]
pub struct CachedCryptoMarket {
    pub snapshot: MarketSnapshot,
    pub matched: CryptoMarketMatch,
}

/// Crypto markets keyed by market id, overwritten on every snapshot.
/// Populated by the snapshot consumer, read by the crypto-price consumer.
#[derive(Default)]
pub struct CryptoMarketCache {
    entries: DashMap<String, CachedCryptoMarket>,
}

impl CryptoMarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: MarketSnapshot, matched: CryptoMarketMatch) {
        self.entries.insert(
            snapshot.market_id.clone(),
            CachedCryptoMarket { snapshot, matched },
        );
    }

    pub fn for_symbol(&self, symbol: &str) -> Vec<CachedCryptoMarket> {
        self.entries
            .iter()
            .filter(|e| e.value().matched.symbol == symbol)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// market id → question text, fed by snapshots.
#[derive(Default)]
pub struct MarketNameResolver {
    names: DashMap<String, String>,
}

impl MarketNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, market_id: &str, question: &str) {
        self.names.insert(market_id.to_string(), question.to_string());
    }

    pub fn resolve(&self, market_id: &str) -> Option<String> {
        self.names.get(market_id).map(|q| q.clone())
    }
}

/// Bounded first-seen set for at-least-once streams. Flushes wholesale once
/// past the cap, trading a burst of duplicates for bounded memory.
pub struct SeenSet {
    seen: DashMap<String, ()>,
    flush_at: usize,
}

impl SeenSet {
    pub fn new(flush_at: usize) -> Self {
        Self {
            seen: DashMap::new(),
            flush_at,
        }
    }

    /// Returns true the first time a key is observed.
    pub fn insert_new(&self, key: &str) -> bool {
        if self.seen.len() > self.flush_at {
            self.seen.clear();
        }
        self.seen.insert(key.to_string(), ()).is_none()
    }
}

/// Rolling per-market record of recent anomaly signals, backing the quality
/// scorer's `anomaly_signal_count` and news-catalyst inputs.
#[derive(Default)]
pub struct AnomalySignalTracker {
    recent: DashMap<String, Vec<(AnomalyType, DateTime<Utc>)>>,
}

impl AnomalySignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, market_id: &str, anomaly_type: AnomalyType, at: DateTime<Utc>) {
        let cutoff = at - Duration::minutes(SIGNAL_WINDOW_MINUTES);
        let mut entry = self.recent.entry(market_id.to_string()).or_default();
        entry.retain(|(_, ts)| *ts > cutoff);
        entry.push((anomaly_type, at));
    }

    /// Distinct anomaly types seen in the window, capped at 5.
    pub fn signal_count(&self, market_id: &str, now: DateTime<Utc>) -> u32 {
        let cutoff = now - Duration::minutes(SIGNAL_WINDOW_MINUTES);
        let Some(entry) = self.recent.get(market_id) else {
            return 0;
        };
        let mut types: Vec<AnomalyType> = entry
            .iter()
            .filter(|(_, ts)| *ts > cutoff)
            .map(|(t, _)| *t)
            .collect();
        types.sort_by_key(|t| *t as u8);
        types.dedup();
        (types.len() as u32).min(MAX_COUNTED_SIGNALS)
    }

    pub fn has_news_catalyst(&self, market_id: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::minutes(SIGNAL_WINDOW_MINUTES);
        self.recent
            .get(market_id)
            .map(|entry| {
                entry
                    .iter()
                    .any(|(t, ts)| *t == AnomalyType::NewsImpact && *ts > cutoff)
            })
            .unwrap_or(false)
    }
}
