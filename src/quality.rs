//! Rule-based 0-100 signal quality scoring with hard blocks.
//!
//! A signal is actionable only when the score reaches 60 AND no hard block
//! fired. Blocks short-circuit: the report keeps whatever score accumulated
//! before the block, but `is_actionable` is false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTIONABLE_SCORE: u32 = 60;

const SUBJECTIVE_CATEGORIES: &[&str] = &["awards", "rankings", "ai", "politics"];

const SUBJECTIVE_KEYWORDS: &[&str] = &[
    "mvp",
    "dpoy",
    "best",
    "oscar",
    "grammy",
    "emmy",
    "approval rating",
    "ranking",
    "model arena",
    "roty",
    "roy",
    "all-star",
    "pro bowl",
    "hall of fame",
];

const SPORTS_KEYWORDS: &[&str] = &[
    "win",
    "beat",
    "score",
    "spread",
    "vs",
    "match",
    "game",
    "fight",
    "serie a",
    "premier league",
    "nba",
    "nfl",
    "mlb",
    "nhl",
    "ufc",
    "champions league",
    "la liga",
    "bundesliga",
];

const PRICE_KEYWORDS: &[&str] = &[
    "above",
    "below",
    "reach",
    "dip",
    "price",
    "bitcoin",
    "btc",
    "eth",
    "ethereum",
    "sol",
    "s&p",
    "nasdaq",
    "dow",
    "gold",
    "oil",
    "cpi",
    "jobs report",
    "unemployment",
    "fed",
    "rate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    LiveSports,
    PriceBinary,
    ObjectiveMeasurable,
    Unknown,
}

impl MarketType {
    pub fn label(&self) -> &'static str {
        match self {
            MarketType::LiveSports => "Live sports",
            MarketType::PriceBinary => "Price binary",
            MarketType::ObjectiveMeasurable => "Objective / measurable",
            MarketType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: u32,
    pub market_type: MarketType,
    pub hours_to_resolution: Option<f64>,
    pub reasons: Vec<String>,
    pub blocks: Vec<String>,
}

impl QualityReport {
    pub fn is_actionable(&self) -> bool {
        self.score >= ACTIONABLE_SCORE && self.blocks.is_empty()
    }

    /// One-line score breakdown, rendered by the alert formatter.
    pub fn breakdown(&self) -> String {
        self.reasons.join(" | ")
    }
}

/// Inputs the scorer needs about a market and its recent signal activity.
#[derive(Debug, Clone)]
pub struct QualityInput<'a> {
    pub question: &'a str,
    pub category: Option<&'a str>,
    pub end_date: Option<DateTime<Utc>>,
    pub volume: f64,
    /// Distinct recent anomaly signals for this market, capped at 5.
    pub anomaly_signal_count: u32,
    pub has_news_catalyst: bool,
}

pub struct QualityScorer;

impl QualityScorer {
    /// Classify the market from its category and question text.
    pub fn classify(question: &str, category: Option<&str>) -> MarketType {
        let q = question.to_lowercase();
        let cat = category.map(|c| c.to_lowercase());

        if cat.as_deref() == Some("sports") || SPORTS_KEYWORDS.iter().any(|k| q.contains(k)) {
            return MarketType::LiveSports;
        }
        if PRICE_KEYWORDS.iter().any(|k| q.contains(k)) {
            return MarketType::PriceBinary;
        }
        if question.starts_with("Will ") {
            return MarketType::ObjectiveMeasurable;
        }
        MarketType::Unknown
    }

    pub fn assess(input: &QualityInput<'_>, now: DateTime<Utc>) -> QualityReport {
        let mut score = 0u32;
        let mut reasons: Vec<String> = Vec::new();
        let mut blocks: Vec<String> = Vec::new();

        let market_type = Self::classify(input.question, input.category);
        let hours = input
            .end_date
            .map(|end| (end - now).num_minutes() as f64 / 60.0);

        let report = |score, reasons, blocks| QualityReport {
            score,
            market_type,
            hours_to_resolution: hours,
            reasons,
            blocks,
        };

        // Subjective markets are never tradeable on anomalies.
        let q = input.question.to_lowercase();
        let subjective_category = input
            .category
            .map(|c| SUBJECTIVE_CATEGORIES.contains(&c.to_lowercase().as_str()))
            .unwrap_or(false);
        if subjective_category || SUBJECTIVE_KEYWORDS.iter().any(|k| q.contains(k)) {
            blocks.push("subjective market (awards/rankings/opinion)".into());
            return report(score, reasons, blocks);
        }

        if input.volume < 50_000.0 {
            blocks.push(format!("volume ${:.0} below $50k floor", input.volume));
            return report(score, reasons, blocks);
        }

        if let Some(h) = hours {
            if h <= 0.0 {
                blocks.push("market end date already passed".into());
                return report(score, reasons, blocks);
            }
        }

        match hours {
            Some(h) if h <= 24.0 => {
                score += 30;
                reasons.push("resolves within 24h (+30)".into());
            }
            Some(h) if h <= 72.0 => {
                score += 20;
                reasons.push("resolves within 72h (+20)".into());
            }
            Some(h) if h <= 168.0 => {
                score += 10;
                reasons.push("resolves within 7 days (+10)".into());
            }
            Some(_) => {}
            None => {
                score += 5;
                reasons.push("no end date (+5)".into());
            }
        }

        if let Some(h) = hours {
            if h > 168.0 && !input.has_news_catalyst {
                blocks.push("resolution beyond 7 days with no news catalyst".into());
                return report(score, reasons, blocks);
            }
        }

        match market_type {
            MarketType::LiveSports => {
                score += 25;
                reasons.push("live sports market (+25)".into());
            }
            MarketType::PriceBinary => {
                score += 20;
                reasons.push("price binary market (+20)".into());
            }
            MarketType::ObjectiveMeasurable => {
                score += 15;
                reasons.push("objective measurable market (+15)".into());
            }
            MarketType::Unknown => {
                blocks.push("market type unclassifiable".into());
                return report(score, reasons, blocks);
            }
        }

        if input.volume >= 1_000_000.0 {
            score += 15;
            reasons.push("volume over $1M (+15)".into());
        } else if input.volume >= 500_000.0 {
            score += 10;
            reasons.push("volume over $500k (+10)".into());
        } else if input.volume >= 100_000.0 {
            score += 5;
            reasons.push("volume over $100k (+5)".into());
        }

        if input.volume < 100_000.0 {
            blocks.push(format!("volume ${:.0} below $100k", input.volume));
            return report(score, reasons, blocks);
        }

        if input.anomaly_signal_count >= 3 {
            score += 30;
            reasons.push(format!(
                "{} converging anomaly signals (+30)",
                input.anomaly_signal_count
            ));
        } else if input.anomaly_signal_count == 2 {
            score += 15;
            reasons.push("2 converging anomaly signals (+15)".into());
        }

        if input.anomaly_signal_count < 2 {
            blocks.push("fewer than 2 anomaly signals".into());
            return report(score, reasons, blocks);
        }

        report(score, reasons, blocks)
    }
}
