use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType, TradeSignal};
use crate::models::market::{Trade, TradeSide};

/// Flags single trades whose notional value crosses the large-money
/// threshold, following the whale's direction when the implied position
/// still has room to pay.
///
/// A SELL is read as conviction in NO at `1 − price`.
pub struct WhaleDetector;

impl WhaleDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, trade: &Trade) -> Option<AnomalyDetected> {
        let value = trade.trade_value();
        if value < WHALE_VALUE_THRESHOLD {
            return None;
        }

        let is_big_whale = value >= BIG_WHALE_VALUE_THRESHOLD;
        let min_roi = if is_big_whale {
            BIG_WHALE_MIN_ROI
        } else {
            WHALE_MIN_ROI
        };

        let (signal, buy_price) = match trade.side {
            TradeSide::Buy => (TradeSignal::BuyYes, trade.price),
            TradeSide::Sell => (TradeSignal::BuyNo, 1.0 - trade.price),
        };

        if !(VALUE_ZONE_MIN..=VALUE_ZONE_MAX).contains(&buy_price) {
            return None;
        }

        let max_roi = (1.0 - buy_price) / buy_price;
        if max_roi < min_roi {
            return None;
        }

        let label = if is_big_whale { "Big whale" } else { "Whale" };
        let description = format!(
            "{label} {:?} ${value:.0} by {} — follow with {} @ {buy_price:.2}",
            trade.side,
            trade.trader_address,
            signal.label(),
        );

        Some(AnomalyDetected::new(
            AnomalyType::WhaleTrade,
            trade.market_id.clone(),
            description,
            value / WHALE_SEVERITY_SCALE,
            AnomalyDetails::WhaleTrade {
                trader_address: trade.trader_address.clone(),
                side: trade.side,
                trade_value: value,
                signal,
                buy_price,
                max_roi,
                is_big_whale,
            },
            trade.timestamp,
        ))
    }
}

impl Default for WhaleDetector {
    fn default() -> Self {
        Self::new()
    }
}
