//! Quality-gated alert dispatch: rate limit → dedup → throttle → paper
//! trade → format → transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::alerts::format::{format_alert, AlertContext};
use crate::alerts::rate_limit::SignalRateLimiter;
use crate::alerts::transport::AlertTransport;
use crate::caches::MarketNameResolver;
use crate::models::anomaly::{AnomalyDetected, AnomalyType, TradeSignal};
use crate::models::paper::Direction;
use crate::paper::PaperTradingEngine;
use crate::quality::ACTIONABLE_SCORE;

const DEDUP_MAX_ENTRIES: usize = 500;
const THROTTLE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub min_severity: f64,
    pub dedup_minutes: i64,
    pub max_alerts_per_minute: usize,
    /// Base URL for "view market" links, joined with the market id.
    pub market_url_base: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_severity: 0.5,
            dedup_minutes: 15,
            max_alerts_per_minute: 10,
            market_url_base: None,
        }
    }
}

pub struct AlertDispatcher {
    config: DispatcherConfig,
    rate_limiter: SignalRateLimiter,
    paper: Arc<PaperTradingEngine>,
    resolver: Arc<MarketNameResolver>,
    transport: Arc<dyn AlertTransport>,
    recent: Mutex<HashMap<(String, AnomalyType), DateTime<Utc>>>,
    sent_times: Mutex<VecDeque<DateTime<Utc>>>,
}

impl AlertDispatcher {
    pub fn new(
        config: DispatcherConfig,
        rate_limiter: SignalRateLimiter,
        paper: Arc<PaperTradingEngine>,
        resolver: Arc<MarketNameResolver>,
        transport: Arc<dyn AlertTransport>,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            paper,
            resolver,
            transport,
            recent: Mutex::new(HashMap::new()),
            sent_times: Mutex::new(VecDeque::new()),
        }
    }

    /// Run one anomaly through every gate. A drop is message shedding, not
    /// an error; failed gates log at debug and return.
    pub async fn dispatch(&self, anomaly: &AnomalyDetected) {
        let now = Utc::now();

        if anomaly.severity < self.config.min_severity {
            debug!(
                "alert: severity {:.2} below floor for {}",
                anomaly.severity, anomaly.market_id
            );
            return;
        }

        let Some(quality) = anomaly.quality.clone() else {
            debug!("alert: unscored anomaly for {}", anomaly.market_id);
            return;
        };
        if quality.score < ACTIONABLE_SCORE || !quality.blocks.is_empty() {
            debug!(
                "alert: quality {} blocked={} for {}",
                quality.score,
                !quality.blocks.is_empty(),
                anomaly.market_id
            );
            return;
        }
        let Some(signal) = anomaly.signal() else {
            debug!("alert: no trade signal on {:?}", anomaly.anomaly_type);
            return;
        };

        if !self.rate_limiter.allow(now).await {
            return;
        }
        if !self.pass_dedup(anomaly, now).await {
            return;
        }
        if !self.pass_throttle(now).await {
            return;
        }

        let question = self
            .resolver
            .resolve(&anomaly.market_id)
            .unwrap_or_else(|| anomaly.market_id.clone());

        // try_enter runs before transport: a transport failure consumes the
        // portfolio slot but not the rate-limit slot.
        let direction = match signal {
            TradeSignal::BuyYes => Direction::Yes,
            TradeSignal::BuyNo => Direction::No,
        };
        let entry = anomaly.entry_price().and_then(Decimal::from_f64_retain);
        let paper_position = match entry {
            Some(entry) => {
                self.paper
                    .try_enter(
                        &anomaly.market_id,
                        &question,
                        direction,
                        entry.round_dp(4),
                        quality.score,
                        &anomaly.description,
                        quality.hours_to_resolution,
                    )
                    .await
            }
            None => None,
        };

        let market_url = self
            .config
            .market_url_base
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), anomaly.market_id));

        let text = format_alert(&AlertContext {
            anomaly,
            quality: &quality,
            question: &question,
            market_url: market_url.as_deref(),
            paper_position: paper_position.as_ref(),
            balance: self.paper.balance().await,
            open_count: self.paper.open_count().await,
        });

        match self.transport.send(&text).await {
            Ok(()) => {
                self.rate_limiter.commit(now).await;
                info!(
                    "alert sent: {:?} {} [{}]",
                    anomaly.anomaly_type, anomaly.market_id, quality.score
                );
            }
            Err(e) => {
                // Swallowed: the rate-limit slot is not consumed.
                error!("alert transport failed for {}: {e}", anomaly.market_id);
            }
        }
    }

    /// Per-(market, type) cooldown. Marks the entry on pass and prunes the
    /// map when it outgrows its bound.
    async fn pass_dedup(&self, anomaly: &AnomalyDetected, now: DateTime<Utc>) -> bool {
        let mut recent = self.recent.lock().await;
        let cooldown = Duration::minutes(self.config.dedup_minutes);
        let key = (anomaly.market_id.clone(), anomaly.anomaly_type);

        if let Some(last) = recent.get(&key) {
            if now - *last < cooldown {
                debug!(
                    "alert: dedup drop {:?} {} ({}m cooldown)",
                    anomaly.anomaly_type, anomaly.market_id, self.config.dedup_minutes
                );
                return false;
            }
        }

        if recent.len() > DEDUP_MAX_ENTRIES {
            recent.retain(|_, ts| now - *ts < cooldown);
        }
        recent.insert(key, now);
        true
    }

    /// Bursty-minute throttle independent of the per-day limit.
    async fn pass_throttle(&self, now: DateTime<Utc>) -> bool {
        let mut sent = self.sent_times.lock().await;
        let cutoff = now - Duration::seconds(THROTTLE_WINDOW_SECS);
        while sent.front().is_some_and(|t| *t < cutoff) {
            sent.pop_front();
        }
        if sent.len() >= self.config.max_alerts_per_minute {
            debug!("alert: per-minute throttle hit");
            return false;
        }
        sent.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::transport::TransportError;
    use crate::models::anomaly::{AnomalyDetails, SpikeStrategy};
    use crate::quality::{MarketType, QualityReport};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AlertTransport for CountingTransport {
        async fn send(&self, _text: &str) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Rejected("boom".into()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn anomaly(market_id: &str, score: u32) -> AnomalyDetected {
        let mut a = AnomalyDetected::new(
            AnomalyType::PriceSpike,
            market_id,
            "Reversal spike",
            0.9,
            AnomalyDetails::PriceSpike {
                old_price: 0.50,
                new_price: 0.30,
                change_percent: -40.0,
                strategy: SpikeStrategy::Reversal,
                signal: TradeSignal::BuyYes,
                buy_price: 0.30,
                target_price: 0.40,
                expected_roi: 0.333,
            },
            Utc::now(),
        );
        a.quality = Some(QualityReport {
            score,
            market_type: MarketType::PriceBinary,
            hours_to_resolution: Some(12.0),
            reasons: vec!["test (+30)".into()],
            blocks: vec![],
        });
        a
    }

    fn dispatcher(
        dir: &tempfile::TempDir,
        transport: Arc<CountingTransport>,
    ) -> (AlertDispatcher, Arc<PaperTradingEngine>) {
        let paper = Arc::new(PaperTradingEngine::new(
            dec!(1000),
            dir.path().join("paper_trades.json"),
        ));
        let dispatcher = AlertDispatcher::new(
            DispatcherConfig::default(),
            SignalRateLimiter::load_or_new(dir.path().join("rate_limit.json")),
            paper.clone(),
            Arc::new(MarketNameResolver::new()),
            transport,
        );
        (dispatcher, paper)
    }

    #[tokio::test]
    async fn low_quality_never_reaches_transport() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let (dispatcher, paper) = dispatcher(&dir, transport.clone());

        dispatcher.dispatch(&anomaly("m1", 55)).await;
        assert_eq!(transport.sent.load(Ordering::SeqCst), 0);
        assert_eq!(paper.open_count().await, 0, "no paper slot consumed either");
    }

    #[tokio::test]
    async fn qualified_alert_sends_and_enters_paper() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let (dispatcher, paper) = dispatcher(&dir, transport.clone());

        dispatcher.dispatch(&anomaly("m1", 85)).await;
        assert_eq!(transport.sent.load(Ordering::SeqCst), 1);
        assert_eq!(paper.open_count().await, 1);
        assert_eq!(dispatcher.rate_limiter.today_count().await, 1);
    }

    #[tokio::test]
    async fn immediate_duplicate_is_dropped_before_transport() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let (dispatcher, _paper) = dispatcher(&dir, transport.clone());

        dispatcher.dispatch(&anomaly("m1", 85)).await;
        dispatcher.dispatch(&anomaly("m1", 85)).await;
        assert_eq!(
            transport.sent.load(Ordering::SeqCst),
            1,
            "an immediate repeat must be shed by the gate chain"
        );
    }

    #[tokio::test]
    async fn dedup_map_enforces_per_market_type_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let (dispatcher, _paper) = dispatcher(&dir, transport);

        let a = anomaly("m1", 85);
        let t0 = Utc::now();
        assert!(dispatcher.pass_dedup(&a, t0).await, "first sighting passes");
        assert!(
            !dispatcher.pass_dedup(&a, t0 + Duration::minutes(10)).await,
            "same (market, type) inside the 15m cooldown is dropped"
        );
        assert!(
            dispatcher.pass_dedup(&a, t0 + Duration::minutes(16)).await,
            "past the cooldown it passes again"
        );

        let other_market = anomaly("m2", 85);
        assert!(
            dispatcher.pass_dedup(&other_market, t0).await,
            "different market is independent"
        );
    }

    #[tokio::test]
    async fn transport_failure_consumes_paper_slot_but_not_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail: true,
        });
        let (dispatcher, paper) = dispatcher(&dir, transport.clone());

        dispatcher.dispatch(&anomaly("m1", 85)).await;
        assert_eq!(paper.open_count().await, 1, "slot consumed before transport");
        assert_eq!(
            dispatcher.rate_limiter.today_count().await,
            0,
            "failed transport must not burn a rate-limit slot"
        );
    }
}
