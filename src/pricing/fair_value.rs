//! Log-normal fair value for "asset crosses target by expiry" binary markets.
//!
//! With zero drift, P(S_T > K) = Φ(d2) where
//!   d2 = (ln(S/K) − σ²·T/2) / (σ·√T)
//! and Φ is approximated by the Abramowitz–Stegun erf polynomial (26.2.17).

use chrono::{DateTime, Utc};

const DAYS_PER_YEAR: f64 = 365.25;

// Abramowitz–Stegun erf approximation constants.
const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;
const P: f64 = 0.3275911;

pub struct FairValueCalculator;

impl FairValueCalculator {
    /// Model-implied probability that spot finishes above `target` after
    /// `years`. Clamped to [0.01, 0.99]; expired inputs collapse to the
    /// near-certain 0.98 / 0.02.
    pub fn prob_above(spot: f64, target: f64, annual_vol: f64, years: f64) -> f64 {
        if years <= 0.0 {
            return if spot >= target { 0.98 } else { 0.02 };
        }
        if spot <= 0.0 || target <= 0.0 || annual_vol <= 0.0 {
            return 0.5;
        }

        let d2 = ((spot / target).ln() - annual_vol * annual_vol * years / 2.0)
            / (annual_vol * years.sqrt());
        Self::norm_cdf(d2).clamp(0.01, 0.99)
    }

    /// Fair value for the market's YES side given its direction.
    pub fn fair_probability(
        spot: f64,
        target: f64,
        annual_vol: f64,
        years: f64,
        is_above: bool,
    ) -> f64 {
        let above = Self::prob_above(spot, target, annual_vol, years);
        if is_above {
            above
        } else {
            1.0 - above
        }
    }

    pub fn years_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        (expiry - now).num_seconds() as f64 / (DAYS_PER_YEAR * 86_400.0)
    }

    /// Standard normal CDF via the A&S erf polynomial. Max error ~1.5e-7.
    fn norm_cdf(x: f64) -> f64 {
        let sign = if x < 0.0 { -1.0 } else { 1.0 };
        let z = x.abs() / std::f64::consts::SQRT_2;

        let t = 1.0 / (1.0 + P * z);
        let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
        let erf = 1.0 - poly * (-z * z).exp();

        0.5 * (1.0 + sign * erf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, Normal};

    #[test]
    fn cdf_matches_statrs_oracle() {
        let normal = Normal::new(0.0, 1.0).expect("valid normal distribution");
        for i in -40..=40 {
            let x = i as f64 * 0.1;
            let ours = FairValueCalculator::norm_cdf(x);
            let oracle = normal.cdf(x);
            assert!(
                (ours - oracle).abs() < 1e-6,
                "cdf({x}) = {ours}, oracle {oracle}"
            );
        }
    }

    #[test]
    fn expired_market_collapses() {
        assert_eq!(
            FairValueCalculator::prob_above(110_000.0, 100_000.0, 0.65, 0.0),
            0.98
        );
        assert_eq!(
            FairValueCalculator::prob_above(90_000.0, 100_000.0, 0.65, -0.5),
            0.02
        );
    }

    #[test]
    fn probability_always_within_clamp() {
        // Deep in/out of the money with tiny vol would hit 0/1 without the clamp.
        let hi = FairValueCalculator::prob_above(200_000.0, 100_000.0, 0.10, 0.05);
        let lo = FairValueCalculator::prob_above(50_000.0, 100_000.0, 0.10, 0.05);
        assert_eq!(hi, 0.99);
        assert_eq!(lo, 0.01);
    }

    #[test]
    fn at_the_money_is_slightly_below_half() {
        // The −σ²T/2 drift correction pushes an ATM binary under 0.50.
        let p = FairValueCalculator::prob_above(100_000.0, 100_000.0, 0.65, 0.25);
        assert!(p < 0.5, "ATM with zero drift should sit below 0.5, got {p}");
        assert!(p > 0.40, "but not by much, got {p}");
    }

    #[test]
    fn btc_two_percent_out_sixty_days() {
        // S = 108k, K = 110k, σ = 0.65, T = 60/365.25.
        let t = 60.0 / 365.25;
        let p = FairValueCalculator::prob_above(108_000.0, 110_000.0, 0.65, t);
        assert!(
            (p - 0.420).abs() < 0.005,
            "expected ~0.420 for 2% OTM at 60d, got {p}"
        );
    }

    #[test]
    fn below_direction_is_complement() {
        let t = 0.25;
        let above = FairValueCalculator::fair_probability(100_000.0, 90_000.0, 0.6, t, true);
        let below = FairValueCalculator::fair_probability(100_000.0, 90_000.0, 0.6, t, false);
        assert!((above + below - 1.0).abs() < 1e-12);
    }
}
