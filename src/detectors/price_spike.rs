use crate::detectors::thresholds::*;
use crate::models::anomaly::{
    AnomalyDetails, AnomalyDetected, AnomalyType, SpikeStrategy, TradeSignal,
};
use crate::models::market::PriceChange;

/// Detects large YES-price moves and classifies them into one of two
/// strategies:
///
///   - Reversal: a sharp drop into the value zone, betting on a bounce of
///     half the drop.
///   - Momentum: a sharp rise while still cheap, betting on continuation.
pub struct PriceSpikeDetector;

impl PriceSpikeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, change: &PriceChange) -> Option<AnomalyDetected> {
        if change.change_percent.abs() < SPIKE_MIN_CHANGE_PCT {
            return None;
        }

        let old = change.old_price;
        let new = change.new_price;

        let details = if new < old {
            Self::reversal(change)?
        } else {
            Self::momentum(change)?
        };

        let (strategy, roi) = match &details {
            AnomalyDetails::PriceSpike {
                strategy,
                expected_roi,
                ..
            } => (*strategy, *expected_roi),
            _ => unreachable!("price spike detector only builds PriceSpike details"),
        };

        let description = format!(
            "{:?} spike: YES {:.2} → {:.2} ({:+.1}%), expected ROI {:.0}%",
            strategy,
            old,
            new,
            change.change_percent,
            roi * 100.0
        );

        Some(AnomalyDetected::new(
            AnomalyType::PriceSpike,
            change.market_id.clone(),
            description,
            change.change_percent.abs() / SPIKE_SEVERITY_SCALE,
            details,
            change.timestamp,
        ))
    }

    fn reversal(change: &PriceChange) -> Option<AnomalyDetails> {
        let new = change.new_price;
        if !(VALUE_ZONE_MIN..=VALUE_ZONE_MAX).contains(&new) {
            return None;
        }

        let drop = change.old_price - new;
        let expected_bounce = REVERSAL_BOUNCE_FRACTION * drop;
        let roi = expected_bounce / new;
        if roi < REVERSAL_MIN_ROI {
            return None;
        }

        Some(AnomalyDetails::PriceSpike {
            old_price: change.old_price,
            new_price: new,
            change_percent: change.change_percent,
            strategy: SpikeStrategy::Reversal,
            signal: TradeSignal::BuyYes,
            buy_price: new,
            target_price: new + expected_bounce,
            expected_roi: roi,
        })
    }

    fn momentum(change: &PriceChange) -> Option<AnomalyDetails> {
        let new = change.new_price;
        if !(MOMENTUM_ZONE_MIN..=MOMENTUM_ZONE_MAX).contains(&new) {
            return None;
        }

        let roi = (1.0 - new) / new;
        if roi < MOMENTUM_MIN_ROI {
            return None;
        }

        Some(AnomalyDetails::PriceSpike {
            old_price: change.old_price,
            new_price: new,
            change_percent: change.change_percent,
            strategy: SpikeStrategy::Momentum,
            signal: TradeSignal::BuyYes,
            buy_price: new,
            target_price: 1.0,
            expected_roi: roi,
        })
    }
}

impl Default for PriceSpikeDetector {
    fn default() -> Self {
        Self::new()
    }
}
