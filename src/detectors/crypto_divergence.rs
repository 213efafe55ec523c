use chrono::{DateTime, Utc};

use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType, TradeSignal};
use crate::models::market::{CryptoPrice, MarketSnapshot};
use crate::pricing::fair_value::FairValueCalculator;
use crate::pricing::matcher::CryptoMarketMatch;

/// Compares a crypto market's YES price against the log-normal model fair
/// value for the question's (symbol, target, direction, expiry).
///
/// A five-cent edge with enough ROI is an arbitrage opportunity; a ten-cent
/// edge is flagged strong.
pub struct CryptoDivergenceDetector;

impl CryptoDivergenceDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        price: &CryptoPrice,
        snapshot: &MarketSnapshot,
        matched: &CryptoMarketMatch,
        now: DateTime<Utc>,
    ) -> Option<AnomalyDetected> {
        if matched.symbol != price.symbol {
            return None;
        }
        let expiry = matched.expiry_date?;

        let yes = snapshot.yes_price;
        if !(CRYPTO_YES_MIN..=CRYPTO_YES_MAX).contains(&yes) {
            return None;
        }

        let years = FairValueCalculator::years_until(expiry, now);
        let days_left = years * 365.25;
        if days_left < CRYPTO_MIN_DAYS_LEFT {
            return None;
        }

        let volatility = price.annual_volatility.clamp(CRYPTO_VOL_MIN, CRYPTO_VOL_MAX);
        let fair = FairValueCalculator::fair_probability(
            price.current_price,
            matched.target_price,
            volatility,
            years,
            matched.is_above,
        );

        let edge = fair - yes;
        if edge.abs() < CRYPTO_MIN_EDGE {
            return None;
        }

        let (signal, buy_price, usable_edge) = if edge > 0.0 {
            (TradeSignal::BuyYes, yes, edge)
        } else {
            (TradeSignal::BuyNo, 1.0 - yes, -edge)
        };

        let expected_roi = usable_edge / buy_price;
        if expected_roi < CRYPTO_MIN_ROI {
            return None;
        }

        let strong_edge = edge.abs() >= CRYPTO_STRONG_EDGE;
        let description = format!(
            "{} model fair {fair:.2} vs market {yes:.2} ({:+.0}c edge) — {} @ {buy_price:.2}, ROI {:.0}%",
            price.symbol,
            edge * 100.0,
            signal.label(),
            expected_roi * 100.0,
        );

        Some(AnomalyDetected::new(
            AnomalyType::ArbitrageOpportunity,
            snapshot.market_id.clone(),
            description,
            edge.abs() / CRYPTO_SEVERITY_SCALE,
            AnomalyDetails::CryptoEdge {
                symbol: price.symbol.clone(),
                spot_price: price.current_price,
                target_price: matched.target_price,
                fair_value: fair,
                market_price: yes,
                edge,
                expected_roi,
                signal,
                volatility,
                days_to_expiry: days_left,
                strong_edge,
            },
            price.timestamp,
        ))
    }
}

impl Default for CryptoDivergenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn price(symbol: &str, spot: f64, vol: f64) -> CryptoPrice {
        CryptoPrice {
            symbol: symbol.into(),
            current_price: spot,
            price_24h_ago: spot,
            annual_volatility: vol,
            timestamp: Utc::now(),
        }
    }

    fn snapshot(yes: f64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".into(),
            question: "Will Bitcoin be above $110,000 on March 31, 2026?".into(),
            yes_price: yes,
            no_price: 1.0 - yes,
            volume_24h: 800_000.0,
            liquidity: 50_000.0,
            end_date: None,
            category: Some("crypto".into()),
            timestamp: Utc::now(),
        }
    }

    fn matched(expiry: Option<DateTime<Utc>>) -> CryptoMarketMatch {
        CryptoMarketMatch {
            symbol: "BTC".into(),
            target_price: 110_000.0,
            is_above: true,
            expiry_date: expiry,
        }
    }

    fn sixty_days_before_expiry() -> (DateTime<Utc>, DateTime<Utc>) {
        let expiry = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        (expiry - Duration::days(60), expiry)
    }

    #[test]
    fn underpriced_yes_emits_arbitrage() {
        let det = CryptoDivergenceDetector::new();
        let (now, expiry) = sixty_days_before_expiry();
        let anomaly = det
            .evaluate(
                &price("BTC", 108_000.0, 0.65),
                &snapshot(0.35),
                &matched(Some(expiry)),
                now,
            )
            .expect("7c edge with 20% ROI should emit");
        assert_eq!(anomaly.anomaly_type, AnomalyType::ArbitrageOpportunity);
        assert_eq!(anomaly.signal(), Some(TradeSignal::BuyYes));
        match anomaly.details {
            AnomalyDetails::CryptoEdge {
                fair_value,
                edge,
                expected_roi,
                strong_edge,
                ..
            } => {
                assert!((fair_value - 0.420).abs() < 0.005, "fair {fair_value}");
                assert!((edge - 0.070).abs() < 0.005, "edge {edge}");
                assert!(expected_roi > 0.15, "roi {expected_roi}");
                assert!(!strong_edge);
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn overpriced_yes_flips_to_no() {
        let det = CryptoDivergenceDetector::new();
        let (now, expiry) = sixty_days_before_expiry();
        let anomaly = det
            .evaluate(
                &price("BTC", 108_000.0, 0.65),
                &snapshot(0.60),
                &matched(Some(expiry)),
                now,
            )
            .expect("fair ~0.42 vs market 0.60 should emit BUY NO");
        assert_eq!(anomaly.signal(), Some(TradeSignal::BuyNo));
        match anomaly.details {
            AnomalyDetails::CryptoEdge { strong_edge, .. } => {
                assert!(strong_edge, "18c edge is strong");
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn missing_expiry_is_skipped() {
        let det = CryptoDivergenceDetector::new();
        let (now, _) = sixty_days_before_expiry();
        assert!(det
            .evaluate(&price("BTC", 108_000.0, 0.65), &snapshot(0.35), &matched(None), now)
            .is_none());
    }

    #[test]
    fn symbol_mismatch_is_skipped() {
        let det = CryptoDivergenceDetector::new();
        let (now, expiry) = sixty_days_before_expiry();
        assert!(det
            .evaluate(
                &price("ETH", 4_000.0, 0.70),
                &snapshot(0.35),
                &matched(Some(expiry)),
                now
            )
            .is_none());
    }

    #[test]
    fn too_close_to_expiry_is_skipped() {
        let det = CryptoDivergenceDetector::new();
        let expiry = Utc::now() + Duration::hours(30);
        assert!(det
            .evaluate(
                &price("BTC", 108_000.0, 0.65),
                &snapshot(0.35),
                &matched(Some(expiry)),
                Utc::now()
            )
            .is_none());
    }

    #[test]
    fn extreme_prices_are_skipped() {
        let det = CryptoDivergenceDetector::new();
        let (now, expiry) = sixty_days_before_expiry();
        for yes in [0.03, 0.95] {
            assert!(det
                .evaluate(
                    &price("BTC", 108_000.0, 0.65),
                    &snapshot(yes),
                    &matched(Some(expiry)),
                    now
                )
                .is_none());
        }
    }

    #[test]
    fn volatility_is_clamped() {
        let det = CryptoDivergenceDetector::new();
        let (now, expiry) = sixty_days_before_expiry();
        // Absurd 800% vol clamps to 200%; the model still produces a bounded
        // fair value and the detector a bounded severity.
        let anomaly = det.evaluate(
            &price("BTC", 108_000.0, 8.0),
            &snapshot(0.35),
            &matched(Some(expiry)),
            now,
        );
        if let Some(a) = anomaly {
            match a.details {
                AnomalyDetails::CryptoEdge { volatility, .. } => assert_eq!(volatility, 2.0),
                other => panic!("unexpected details: {other:?}"),
            }
        }
    }
}
