//! Auto-bet strategist: the second AnomalyDetected subscriber.
//!
//! Applies its own threshold + per-market cooldown, places a fixed-stake
//! order through the `OrderClient` seam, and announces a `BetPlaced`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::events::BetPlaced;
use crate::models::anomaly::{AnomalyDetected, TradeSignal};

#[derive(Debug, Clone)]
pub struct AutoBetConfig {
    pub enabled: bool,
    pub min_quality: u32,
    pub min_severity: f64,
    pub cooldown_minutes: i64,
    pub stake: Decimal,
}

impl Default for AutoBetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_quality: 70,
            min_severity: 0.6,
            cooldown_minutes: 30,
            stake: dec!(10),
        }
    }
}

/// Order placement seam. The on-chain signing client is external; the
/// default implementation just records the intent.
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn place_order(
        &self,
        market_id: &str,
        signal: TradeSignal,
        stake: Decimal,
        price: f64,
    ) -> anyhow::Result<String>;
}

pub struct LoggingOrderClient;

#[async_trait]
impl OrderClient for LoggingOrderClient {
    async fn place_order(
        &self,
        market_id: &str,
        signal: TradeSignal,
        stake: Decimal,
        price: f64,
    ) -> anyhow::Result<String> {
        let order_id = Uuid::new_v4().to_string();
        info!(
            "auto-bet (paper order {order_id}): {} ${stake} on {market_id} @ {price:.2}",
            signal.label(),
        );
        Ok(order_id)
    }
}

pub struct AutoBetStrategist {
    config: AutoBetConfig,
    client: Arc<dyn OrderClient>,
    last_bet: DashMap<String, DateTime<Utc>>,
    bets_tx: broadcast::Sender<BetPlaced>,
}

impl AutoBetStrategist {
    pub fn new(
        config: AutoBetConfig,
        client: Arc<dyn OrderClient>,
        bets_tx: broadcast::Sender<BetPlaced>,
    ) -> Self {
        Self {
            config,
            client,
            last_bet: DashMap::new(),
            bets_tx,
        }
    }

    pub async fn on_anomaly(&self, anomaly: &AnomalyDetected) -> Option<BetPlaced> {
        if !self.config.enabled {
            return None;
        }
        if anomaly.severity < self.config.min_severity {
            return None;
        }
        let score = anomaly.quality_score()?;
        if score < self.config.min_quality {
            return None;
        }
        let signal = anomaly.signal()?;
        let price = anomaly.entry_price()?;

        let now = Utc::now();
        let cooldown = Duration::minutes(self.config.cooldown_minutes);
        if let Some(last) = self.last_bet.get(&anomaly.market_id) {
            if now - *last < cooldown {
                debug!("auto-bet: cooldown active for {}", anomaly.market_id);
                return None;
            }
        }
        // Cooldown marks at acceptance, failed placements included.
        self.last_bet.insert(anomaly.market_id.clone(), now);

        match self
            .client
            .place_order(&anomaly.market_id, signal, self.config.stake, price)
            .await
        {
            Ok(order_id) => {
                let bet = BetPlaced {
                    bet_id: Uuid::new_v4(),
                    market_id: anomaly.market_id.clone(),
                    signal,
                    stake: self.config.stake,
                    anomaly_type: anomaly.anomaly_type,
                    summary: format!("order {order_id}: {}", anomaly.description),
                    timestamp: now,
                };
                let _ = self.bets_tx.send(bet.clone());
                Some(bet)
            }
            Err(e) => {
                error!("auto-bet order failed for {}: {e:#}", anomaly.market_id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::anomaly::{AnomalyDetails, AnomalyType, SpikeStrategy};
    use crate::quality::{MarketType, QualityReport};

    fn anomaly(market_id: &str, score: u32, severity: f64) -> AnomalyDetected {
        let mut a = AnomalyDetected::new(
            AnomalyType::PriceSpike,
            market_id,
            "spike",
            severity,
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
            reasons: vec![],
            blocks: vec![],
        });
        a
    }

    fn strategist(enabled: bool) -> AutoBetStrategist {
        AutoBetStrategist::new(
            AutoBetConfig {
                enabled,
                ..Default::default()
            },
            Arc::new(LoggingOrderClient),
            broadcast::channel(16).0,
        )
    }

    #[tokio::test]
    async fn disabled_strategist_never_bets() {
        let s = strategist(false);
        assert!(s.on_anomaly(&anomaly("m1", 90, 0.9)).await.is_none());
    }

    #[tokio::test]
    async fn qualified_anomaly_places_bet() {
        let s = strategist(true);
        let bet = s.on_anomaly(&anomaly("m1", 90, 0.9)).await.expect("should bet");
        assert_eq!(bet.market_id, "m1");
        assert_eq!(bet.signal, TradeSignal::BuyYes);
    }

    #[tokio::test]
    async fn cooldown_blocks_repeat_bets() {
        let s = strategist(true);
        assert!(s.on_anomaly(&anomaly("m1", 90, 0.9)).await.is_some());
        assert!(
            s.on_anomaly(&anomaly("m1", 90, 0.9)).await.is_none(),
            "same market within cooldown must be skipped"
        );
        assert!(
            s.on_anomaly(&anomaly("m2", 90, 0.9)).await.is_some(),
            "different market is unaffected"
        );
    }

    #[tokio::test]
    async fn low_quality_or_severity_is_skipped() {
        let s = strategist(true);
        assert!(s.on_anomaly(&anomaly("m1", 60, 0.9)).await.is_none());
        assert!(s.on_anomaly(&anomaly("m2", 90, 0.3)).await.is_none());
    }
}
