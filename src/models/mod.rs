pub mod anomaly;
pub mod market;
pub mod paper;
