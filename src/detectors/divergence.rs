use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType};
use crate::models::market::MarketSnapshot;
use chrono::Utc;

/// Price-structure divergences visible from a single snapshot:
/// near-certain markets, YES+NO sums drifting off $1, and the cross-market
/// helper for related pairs.
pub struct MarketDivergenceDetector;

impl MarketDivergenceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Markets trading at near-certainty. Severity scales with how far past
    /// the 0.95/0.05 line the price sits, floored at 0.3.
    pub fn near_resolution(&self, snapshot: &MarketSnapshot) -> Option<AnomalyDetected> {
        let yes = snapshot.yes_price;
        let raw = if yes >= NEAR_RESOLUTION_HIGH {
            (yes - NEAR_RESOLUTION_HIGH) / (1.0 - NEAR_RESOLUTION_HIGH)
        } else if yes <= NEAR_RESOLUTION_LOW {
            (NEAR_RESOLUTION_LOW - yes) / NEAR_RESOLUTION_LOW
        } else {
            return None;
        };

        let side = if yes >= NEAR_RESOLUTION_HIGH { "YES" } else { "NO" };
        Some(AnomalyDetected::new(
            AnomalyType::NearResolution,
            snapshot.market_id.clone(),
            format!("market near-certain on {side} (YES {yes:.2})"),
            raw.max(NEAR_RESOLUTION_MIN_SEVERITY),
            AnomalyDetails::NearResolution {
                yes_price: yes,
                hours_to_resolution: snapshot.hours_to_resolution(Utc::now()),
            },
            snapshot.timestamp,
        ))
    }

    /// YES+NO drifting away from $1.00 beyond the venue's normal rounding.
    pub fn price_sum(&self, snapshot: &MarketSnapshot) -> Option<AnomalyDetected> {
        let deviation = (snapshot.yes_price + snapshot.no_price - 1.0).abs();
        if deviation < PRICE_SUM_MIN_DEVIATION {
            return None;
        }

        Some(AnomalyDetected::new(
            AnomalyType::MarketDivergence,
            snapshot.market_id.clone(),
            format!(
                "YES {:.2} + NO {:.2} deviates {deviation:.2} from 1.00",
                snapshot.yes_price, snapshot.no_price
            ),
            deviation / PRICE_SUM_SEVERITY_SCALE,
            AnomalyDetails::PriceSumDivergence {
                yes_price: snapshot.yes_price,
                no_price: snapshot.no_price,
                deviation,
            },
            snapshot.timestamp,
        ))
    }

    /// Two related markets whose YES prices disagree by 10+ cents.
    pub fn cross_market(
        &self,
        a: &MarketSnapshot,
        b: &MarketSnapshot,
    ) -> Option<AnomalyDetected> {
        let difference = (a.yes_price - b.yes_price).abs();
        if difference < CROSS_MARKET_MIN_GAP {
            return None;
        }

        Some(AnomalyDetected::new(
            AnomalyType::MarketDivergence,
            a.market_id.clone(),
            format!(
                "YES {:.2} vs {:.2} on related market {}",
                a.yes_price, b.yes_price, b.market_id
            ),
            difference / PRICE_SUM_SEVERITY_SCALE,
            AnomalyDetails::CrossMarketDivergence {
                other_market_id: b.market_id.clone(),
                difference,
            },
            a.timestamp,
        ))
    }
}

impl Default for MarketDivergenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(yes: f64, no: f64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".into(),
            question: "Will it?".into(),
            yes_price: yes,
            no_price: no,
            volume_24h: 100_000.0,
            liquidity: 10_000.0,
            end_date: None,
            category: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn middle_prices_never_fire_near_resolution() {
        let det = MarketDivergenceDetector::new();
        for yes in [0.06, 0.30, 0.50, 0.80, 0.94] {
            assert!(
                det.near_resolution(&snapshot(yes, 1.0 - yes)).is_none(),
                "yes={yes} must not fire"
            );
        }
    }

    #[test]
    fn near_certain_fires_with_severity_floor() {
        let det = MarketDivergenceDetector::new();
        let anomaly = det
            .near_resolution(&snapshot(0.95, 0.05))
            .expect("0.95 is the boundary");
        assert_eq!(anomaly.severity, 0.3, "severity floored at 0.3 at the line");

        let anomaly = det.near_resolution(&snapshot(0.99, 0.01)).unwrap();
        assert!((anomaly.severity - 0.8).abs() < 1e-9);

        let anomaly = det.near_resolution(&snapshot(0.02, 0.98)).unwrap();
        assert!((anomaly.severity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn price_sum_fires_on_ten_cent_drift() {
        let det = MarketDivergenceDetector::new();
        assert!(det.price_sum(&snapshot(0.55, 0.50)).is_none(), "5c is normal");
        let anomaly = det.price_sum(&snapshot(0.60, 0.52)).expect("12c drift");
        assert!((anomaly.severity - 0.4).abs() < 1e-9);
    }

    #[test]
    fn cross_market_gap() {
        let det = MarketDivergenceDetector::new();
        let mut b = snapshot(0.42, 0.58);
        b.market_id = "m2".into();
        assert!(det.cross_market(&snapshot(0.45, 0.55), &b).is_none());
        b.yes_price = 0.30;
        assert!(det.cross_market(&snapshot(0.45, 0.55), &b).is_some());
    }
}
