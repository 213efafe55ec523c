//! Per-stream stateful anomaly detectors.
//!
//! Each detector exposes a single `evaluate` entry point that inspects the
//! event against pre-update state and then folds the event in, so the
//! compare-then-update order is fixed at the type level.

pub mod crypto_divergence;
pub mod divergence;
pub mod news;
pub mod order_book;
pub mod price_spike;
pub mod spread;
pub mod thresholds;
pub mod volume_spike;
pub mod whale;

pub use crypto_divergence::CryptoDivergenceDetector;
pub use divergence::MarketDivergenceDetector;
pub use news::NewsImpactDetector;
pub use order_book::OrderBookImbalanceDetector;
pub use price_spike::PriceSpikeDetector;
pub use spread::SpreadDetector;
pub use volume_spike::VolumeSpikeDetector;
pub use whale::WhaleDetector;
