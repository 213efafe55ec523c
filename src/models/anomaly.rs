use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::market::TradeSide;
use crate::quality::QualityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    PriceSpike,
    VolumeSpike,
    WhaleTrade,
    MarketDivergence,
    NearResolution,
    OrderBookImbalance,
    SpreadAnomaly,
    NewsImpact,
    CryptoDivergence,
    ArbitrageOpportunity,
}

/// Actionable direction attached to an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSignal {
    BuyYes,
    BuyNo,
}

impl TradeSignal {
    pub fn label(&self) -> &'static str {
        match self {
            TradeSignal::BuyYes => "BUY YES",
            TradeSignal::BuyNo => "BUY NO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikeStrategy {
    Reversal,
    Momentum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadKind {
    Wide,
    Spike,
}

/// Strongly-typed payload per anomaly type.
///
/// The historical system carried a string-keyed map; `AnomalyDetected::details_map`
/// renders that shape at the serialisation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnomalyDetails {
    PriceSpike {
        old_price: f64,
        new_price: f64,
        change_percent: f64,
        strategy: SpikeStrategy,
        signal: TradeSignal,
        buy_price: f64,
        target_price: f64,
        expected_roi: f64,
    },
    VolumeSpike {
        volume: f64,
        average_volume: f64,
        multiplier: f64,
    },
    WhaleTrade {
        trader_address: String,
        side: TradeSide,
        trade_value: f64,
        signal: TradeSignal,
        buy_price: f64,
        max_roi: f64,
        is_big_whale: bool,
    },
    PriceSumDivergence {
        yes_price: f64,
        no_price: f64,
        deviation: f64,
    },
    CrossMarketDivergence {
        other_market_id: String,
        difference: f64,
    },
    NearResolution {
        yes_price: f64,
        hours_to_resolution: Option<f64>,
    },
    OrderBookImbalance {
        imbalance_ratio: f64,
        bid_depth: f64,
        ask_depth: f64,
        signal: TradeSignal,
        buy_price: f64,
        max_roi: f64,
    },
    SpreadAnomaly {
        spread: f64,
        average_spread: f64,
        kind: SpreadKind,
    },
    NewsImpact {
        headline: String,
        source: String,
        url: String,
        relevance: f64,
    },
    CryptoEdge {
        symbol: String,
        spot_price: f64,
        target_price: f64,
        fair_value: f64,
        market_price: f64,
        edge: f64,
        expected_roi: f64,
        signal: TradeSignal,
        volatility: f64,
        days_to_expiry: f64,
        strong_edge: bool,
    },
}

/// One detected anomaly, published on the anomaly topic and consumed by the
/// alert dispatcher, the auto-bet strategist, and the raw persister.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetected {
    pub anomaly_type: AnomalyType,
    pub market_id: String,
    pub description: String,
    pub severity: f64,
    pub details: AnomalyDetails,
    /// Attached by the pipeline before publishing; None for raw anomalies.
    pub quality: Option<QualityReport>,
    pub timestamp: DateTime<Utc>,
}

impl AnomalyDetected {
    pub fn new(
        anomaly_type: AnomalyType,
        market_id: impl Into<String>,
        description: impl Into<String>,
        severity: f64,
        details: AnomalyDetails,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            anomaly_type,
            market_id: market_id.into(),
            description: description.into(),
            severity: severity.clamp(0.0, 1.0),
            details,
            quality: None,
            timestamp,
        }
    }

    pub fn signal(&self) -> Option<TradeSignal> {
        match &self.details {
            AnomalyDetails::PriceSpike { signal, .. }
            | AnomalyDetails::WhaleTrade { signal, .. }
            | AnomalyDetails::OrderBookImbalance { signal, .. }
            | AnomalyDetails::CryptoEdge { signal, .. } => Some(*signal),
            _ => None,
        }
    }

    /// Price paid for the signalled side, when the anomaly is actionable.
    pub fn entry_price(&self) -> Option<f64> {
        match &self.details {
            AnomalyDetails::PriceSpike { buy_price, .. }
            | AnomalyDetails::WhaleTrade { buy_price, .. }
            | AnomalyDetails::OrderBookImbalance { buy_price, .. } => Some(*buy_price),
            AnomalyDetails::CryptoEdge { market_price, signal, .. } => Some(match signal {
                TradeSignal::BuyYes => *market_price,
                TradeSignal::BuyNo => 1.0 - *market_price,
            }),
            _ => None,
        }
    }

    pub fn expected_roi(&self) -> Option<f64> {
        match &self.details {
            AnomalyDetails::PriceSpike { expected_roi, .. }
            | AnomalyDetails::CryptoEdge { expected_roi, .. } => Some(*expected_roi),
            AnomalyDetails::WhaleTrade { max_roi, .. }
            | AnomalyDetails::OrderBookImbalance { max_roi, .. } => Some(*max_roi),
            _ => None,
        }
    }

    pub fn quality_score(&self) -> Option<u32> {
        self.quality.as_ref().map(|q| q.score)
    }

    /// Render the historical string-keyed details map for storage consumers.
    pub fn details_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(signal) = self.signal() {
            map.insert("signal".into(), json!(signal.label()));
        }
        if let Some(q) = &self.quality {
            map.insert("qualityScore".into(), json!(q.score));
        }
        match &self.details {
            AnomalyDetails::PriceSpike {
                old_price,
                new_price,
                change_percent,
                strategy,
                buy_price,
                target_price,
                expected_roi,
                ..
            } => {
                map.insert("oldPrice".into(), json!(old_price));
                map.insert("newPrice".into(), json!(new_price));
                map.insert("changePercent".into(), json!(change_percent));
                map.insert("strategy".into(), json!(format!("{strategy:?}")));
                map.insert("buyPrice".into(), json!(buy_price));
                map.insert("targetPrice".into(), json!(target_price));
                map.insert("expectedRoi".into(), json!(expected_roi));
            }
            AnomalyDetails::VolumeSpike {
                volume,
                average_volume,
                multiplier,
            } => {
                map.insert("volume".into(), json!(volume));
                map.insert("averageVolume".into(), json!(average_volume));
                map.insert("multiplier".into(), json!(multiplier));
            }
            AnomalyDetails::WhaleTrade {
                trader_address,
                side,
                trade_value,
                buy_price,
                max_roi,
                is_big_whale,
                ..
            } => {
                map.insert("traderAddress".into(), json!(trader_address));
                map.insert("side".into(), json!(format!("{side:?}").to_uppercase()));
                map.insert("tradeValue".into(), json!(trade_value));
                map.insert("buyPrice".into(), json!(buy_price));
                map.insert("maxRoi".into(), json!(max_roi));
                map.insert("isBigWhale".into(), json!(is_big_whale));
            }
            AnomalyDetails::PriceSumDivergence {
                yes_price,
                no_price,
                deviation,
            } => {
                map.insert("yesPrice".into(), json!(yes_price));
                map.insert("noPrice".into(), json!(no_price));
                map.insert("deviation".into(), json!(deviation));
            }
            AnomalyDetails::CrossMarketDivergence {
                other_market_id,
                difference,
            } => {
                map.insert("otherMarketId".into(), json!(other_market_id));
                map.insert("difference".into(), json!(difference));
            }
            AnomalyDetails::NearResolution {
                yes_price,
                hours_to_resolution,
            } => {
                map.insert("yesPrice".into(), json!(yes_price));
                if let Some(h) = hours_to_resolution {
                    map.insert("hoursToResolution".into(), json!(h));
                }
            }
            AnomalyDetails::OrderBookImbalance {
                imbalance_ratio,
                bid_depth,
                ask_depth,
                buy_price,
                max_roi,
                ..
            } => {
                map.insert("imbalanceRatio".into(), json!(imbalance_ratio));
                map.insert("bidDepth".into(), json!(bid_depth));
                map.insert("askDepth".into(), json!(ask_depth));
                map.insert("buyPrice".into(), json!(buy_price));
                map.insert("maxRoi".into(), json!(max_roi));
            }
            AnomalyDetails::SpreadAnomaly {
                spread,
                average_spread,
                kind,
            } => {
                map.insert("spread".into(), json!(spread));
                map.insert("averageSpread".into(), json!(average_spread));
                map.insert("kind".into(), json!(format!("{kind:?}")));
            }
            AnomalyDetails::NewsImpact {
                headline,
                source,
                url,
                relevance,
            } => {
                map.insert("headline".into(), json!(headline));
                map.insert("source".into(), json!(source));
                map.insert("url".into(), json!(url));
                map.insert("relevance".into(), json!(relevance));
            }
            AnomalyDetails::CryptoEdge {
                symbol,
                spot_price,
                target_price,
                fair_value,
                market_price,
                edge,
                expected_roi,
                volatility,
                days_to_expiry,
                strong_edge,
                ..
            } => {
                map.insert("symbol".into(), json!(symbol));
                map.insert("spotPrice".into(), json!(spot_price));
                map.insert("targetPrice".into(), json!(target_price));
                map.insert("fairValue".into(), json!(fair_value));
                map.insert("marketPrice".into(), json!(market_price));
                map.insert("edge".into(), json!(edge));
                map.insert("expectedRoi".into(), json!(expected_roi));
                map.insert("volatility".into(), json!(volatility));
                map.insert("daysToExpiry".into(), json!(days_to_expiry));
                map.insert("strongEdge".into(), json!(strong_edge));
            }
        }
        map
    }
}
