//! Numeric policy shared across the detector suite.
//!
//! The value zone is the price band where the bought side's reward-to-risk
//! is attractive; every directional detector checks it.

/// Lower bound of the buyable price band.
pub const VALUE_ZONE_MIN: f64 = 0.08;
/// Upper bound of the buyable price band.
pub const VALUE_ZONE_MAX: f64 = 0.70;

// Price spike
pub const SPIKE_MIN_CHANGE_PCT: f64 = 15.0;
pub const SPIKE_SEVERITY_SCALE: f64 = 20.0;
pub const REVERSAL_BOUNCE_FRACTION: f64 = 0.5;
pub const REVERSAL_MIN_ROI: f64 = 0.20;
pub const MOMENTUM_ZONE_MIN: f64 = 0.10;
pub const MOMENTUM_ZONE_MAX: f64 = 0.60;
pub const MOMENTUM_MIN_ROI: f64 = 0.50;

// Volume spike
pub const VOLUME_EWMA_ALPHA: f64 = 0.1;
pub const VOLUME_SPIKE_MULTIPLIER: f64 = 3.0;
pub const VOLUME_SEVERITY_SCALE: f64 = 10.0;

// Whale trades
pub const WHALE_VALUE_THRESHOLD: f64 = 10_000.0;
pub const BIG_WHALE_VALUE_THRESHOLD: f64 = 50_000.0;
pub const WHALE_MIN_ROI: f64 = 0.50;
pub const BIG_WHALE_MIN_ROI: f64 = 0.30;
pub const WHALE_SEVERITY_SCALE: f64 = 100_000.0;

// Order book imbalance
pub const IMBALANCE_EWMA_ALPHA: f64 = 0.15;
pub const IMBALANCE_MIN_RATIO: f64 = 0.9;
pub const IMBALANCE_MIN_DEPTH: f64 = 500.0;
pub const IMBALANCE_MIN_OBSERVATIONS: u32 = 3;
pub const IMBALANCE_CHRONIC_AVERAGE: f64 = 0.7;
pub const IMBALANCE_MIN_ROI: f64 = 0.40;

// Spread
pub const SPREAD_EWMA_ALPHA: f64 = 0.1;
pub const SPREAD_MIN_OBSERVATIONS: u32 = 3;
pub const SPREAD_WIDE_THRESHOLD: f64 = 0.10;
pub const SPREAD_WIDE_SEVERITY_SCALE: f64 = 0.15;
pub const SPREAD_SPIKE_MULTIPLIER: f64 = 3.0;
pub const SPREAD_SPIKE_SEVERITY_SCALE: f64 = 10.0;

// Market divergence
pub const NEAR_RESOLUTION_HIGH: f64 = 0.95;
pub const NEAR_RESOLUTION_LOW: f64 = 0.05;
pub const NEAR_RESOLUTION_MIN_SEVERITY: f64 = 0.3;
pub const PRICE_SUM_MIN_DEVIATION: f64 = 0.10;
pub const PRICE_SUM_SEVERITY_SCALE: f64 = 0.30;
pub const CROSS_MARKET_MIN_GAP: f64 = 0.10;

// News
pub const NEWS_MIN_RELEVANCE: f64 = 0.4;
pub const HEADLINE_PREVIEW_CHARS: usize = 80;

// Crypto divergence
pub const CRYPTO_MIN_EDGE: f64 = 0.05;
pub const CRYPTO_STRONG_EDGE: f64 = 0.10;
pub const CRYPTO_MIN_ROI: f64 = 0.15;
pub const CRYPTO_MIN_DAYS_LEFT: f64 = 2.0;
pub const CRYPTO_YES_MIN: f64 = 0.05;
pub const CRYPTO_YES_MAX: f64 = 0.90;
pub const CRYPTO_VOL_MIN: f64 = 0.10;
pub const CRYPTO_VOL_MAX: f64 = 2.0;
pub const CRYPTO_SEVERITY_SCALE: f64 = 0.15;
