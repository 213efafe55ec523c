use std::collections::HashMap;

use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType, TradeSignal};
use crate::models::market::OrderBookUpdate;

#[derive(Debug, Clone, Copy, Default)]
struct BookBaseline {
    avg_abs_imbalance: f64,
    observations: u32,
}

/// Flags books with extreme one-sided depth, skipping chronically
/// imbalanced markets whose EWMA baseline is already lopsided.
pub struct OrderBookImbalanceDetector {
    baselines: HashMap<String, BookBaseline>,
}

impl OrderBookImbalanceDetector {
    pub fn new() -> Self {
        Self {
            baselines: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, book: &OrderBookUpdate) -> Option<AnomalyDetected> {
        let abs_imbalance = book.imbalance_ratio.abs();
        let baseline = self
            .baselines
            .get(&book.market_id)
            .copied()
            .unwrap_or_default();

        let anomaly = self.detect(book, abs_imbalance, baseline);

        let entry = self.baselines.entry(book.market_id.clone()).or_default();
        if entry.observations == 0 {
            entry.avg_abs_imbalance = abs_imbalance;
        } else {
            entry.avg_abs_imbalance = (1.0 - IMBALANCE_EWMA_ALPHA) * entry.avg_abs_imbalance
                + IMBALANCE_EWMA_ALPHA * abs_imbalance;
        }
        entry.observations += 1;

        anomaly
    }

    fn detect(
        &self,
        book: &OrderBookUpdate,
        abs_imbalance: f64,
        baseline: BookBaseline,
    ) -> Option<AnomalyDetected> {
        if abs_imbalance < IMBALANCE_MIN_RATIO
            || book.total_depth() < IMBALANCE_MIN_DEPTH
            || baseline.observations < IMBALANCE_MIN_OBSERVATIONS
            || baseline.avg_abs_imbalance > IMBALANCE_CHRONIC_AVERAGE
        {
            return None;
        }

        let midpoint = book.midpoint();
        let (signal, buy_price) = if book.imbalance_ratio > 0.0 {
            (TradeSignal::BuyYes, midpoint)
        } else {
            (TradeSignal::BuyNo, 1.0 - midpoint)
        };

        if !(VALUE_ZONE_MIN..=VALUE_ZONE_MAX).contains(&buy_price) {
            return None;
        }
        let max_roi = (1.0 - buy_price) / buy_price;
        if max_roi < IMBALANCE_MIN_ROI {
            return None;
        }

        let pressure = if book.imbalance_ratio > 0.0 { "buy" } else { "sell" };
        Some(AnomalyDetected::new(
            AnomalyType::OrderBookImbalance,
            book.market_id.clone(),
            format!(
                "{pressure}-side depth imbalance {:.2} ({:.0} vs {:.0}) — {} @ {buy_price:.2}",
                book.imbalance_ratio,
                book.bid_depth,
                book.ask_depth,
                signal.label(),
            ),
            abs_imbalance,
            AnomalyDetails::OrderBookImbalance {
                imbalance_ratio: book.imbalance_ratio,
                bid_depth: book.bid_depth,
                ask_depth: book.ask_depth,
                signal,
                buy_price,
                max_roi,
            },
            book.timestamp,
        ))
    }
}

impl Default for OrderBookImbalanceDetector {
    fn default() -> Self {
        Self::new()
    }
}
