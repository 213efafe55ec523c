use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType};
use crate::models::market::NewsItem;

/// Surfaces news items whose keyword relevance clears the floor.
pub struct NewsImpactDetector;

impl NewsImpactDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, item: &NewsItem) -> Option<AnomalyDetected> {
        if item.relevance < NEWS_MIN_RELEVANCE {
            return None;
        }

        let preview: String = item.headline.chars().take(HEADLINE_PREVIEW_CHARS).collect();
        Some(AnomalyDetected::new(
            AnomalyType::NewsImpact,
            item.market_id.clone(),
            format!("news ({:.0}% relevant): {preview}", item.relevance * 100.0),
            item.relevance,
            AnomalyDetails::NewsImpact {
                headline: item.headline.clone(),
                source: item.source.clone(),
                url: item.url.clone(),
                relevance: item.relevance,
            },
            item.timestamp,
        ))
    }
}

impl Default for NewsImpactDetector {
    fn default() -> Self {
        Self::new()
    }
}
