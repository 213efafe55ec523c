use std::collections::HashMap;

use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType, SpreadKind};
use crate::models::market::OrderBookUpdate;

#[derive(Debug, Clone, Copy, Default)]
struct SpreadBaseline {
    avg_spread: f64,
    observations: u32,
}

/// Flags wide spreads (absolute) and spread spikes (relative to the
/// market's own EWMA baseline).
pub struct SpreadDetector {
    baselines: HashMap<String, SpreadBaseline>,
}

impl SpreadDetector {
    pub fn new() -> Self {
        Self {
            baselines: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, book: &OrderBookUpdate) -> Option<AnomalyDetected> {
        let spread = book.spread;
        let baseline = self
            .baselines
            .get(&book.market_id)
            .copied()
            .unwrap_or_default();

        let anomaly = Self::detect(book, spread, baseline);

        let entry = self.baselines.entry(book.market_id.clone()).or_default();
        if entry.observations == 0 {
            entry.avg_spread = spread;
        } else {
            entry.avg_spread =
                (1.0 - SPREAD_EWMA_ALPHA) * entry.avg_spread + SPREAD_EWMA_ALPHA * spread;
        }
        entry.observations += 1;

        anomaly
    }

    fn detect(
        book: &OrderBookUpdate,
        spread: f64,
        baseline: SpreadBaseline,
    ) -> Option<AnomalyDetected> {
        if baseline.observations < SPREAD_MIN_OBSERVATIONS {
            return None;
        }

        let (kind, severity) = if spread >= SPREAD_WIDE_THRESHOLD {
            (SpreadKind::Wide, spread / SPREAD_WIDE_SEVERITY_SCALE)
        } else if baseline.avg_spread > 0.0
            && spread / baseline.avg_spread >= SPREAD_SPIKE_MULTIPLIER
        {
            (
                SpreadKind::Spike,
                (spread / baseline.avg_spread) / SPREAD_SPIKE_SEVERITY_SCALE,
            )
        } else {
            return None;
        };

        Some(AnomalyDetected::new(
            AnomalyType::SpreadAnomaly,
            book.market_id.clone(),
            format!(
                "{kind:?} spread {spread:.3} vs {:.3} average",
                baseline.avg_spread
            ),
            severity,
            AnomalyDetails::SpreadAnomaly {
                spread,
                average_spread: baseline.avg_spread,
                kind,
            },
            book.timestamp,
        ))
    }
}

impl Default for SpreadDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(spread: f64) -> OrderBookUpdate {
        let mid = 0.50;
        OrderBookUpdate::new(
            "m1".into(),
            mid - spread / 2.0,
            mid + spread / 2.0,
            500.0,
            500.0,
            Utc::now(),
        )
    }

    #[test]
    fn never_emits_before_three_observations() {
        let mut det = SpreadDetector::new();
        assert!(det.evaluate(&book(0.20)).is_none());
        assert!(det.evaluate(&book(0.20)).is_none());
        assert!(det.evaluate(&book(0.20)).is_none());
    }

    #[test]
    fn wide_spread_emits_after_warmup() {
        let mut det = SpreadDetector::new();
        for _ in 0..3 {
            det.evaluate(&book(0.12));
        }
        let anomaly = det.evaluate(&book(0.12)).expect("0.12 is a wide spread");
        match anomaly.details {
            AnomalyDetails::SpreadAnomaly { kind, .. } => assert_eq!(kind, SpreadKind::Wide),
            other => panic!("unexpected details: {other:?}"),
        }
        assert!((anomaly.severity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn spike_relative_to_baseline_emits() {
        let mut det = SpreadDetector::new();
        for _ in 0..4 {
            det.evaluate(&book(0.02));
        }
        let anomaly = det.evaluate(&book(0.07)).expect("3.5x baseline spread");
        match anomaly.details {
            AnomalyDetails::SpreadAnomaly { kind, average_spread, .. } => {
                assert_eq!(kind, SpreadKind::Spike);
                assert!((average_spread - 0.02).abs() < 1e-9);
            }
            other => panic!("unexpected details: {other:?}"),
        }
        assert!((anomaly.severity - 0.35).abs() < 1e-9);
    }

    #[test]
    fn normal_spread_stays_quiet() {
        let mut det = SpreadDetector::new();
        for _ in 0..5 {
            assert!(det.evaluate(&book(0.02)).is_none());
        }
        assert!(det.evaluate(&book(0.04)).is_none(), "2x baseline is not a spike");
    }
}
