//! Assembles the human-readable alert message.

use rust_decimal::Decimal;

use crate::models::anomaly::{AnomalyDetails, AnomalyDetected};
use crate::models::paper::PaperPosition;
use crate::quality::QualityReport;

/// Escape the three HTML-significant characters the chat API cares about.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn quality_emoji(score: u32) -> &'static str {
    if score >= 85 {
        "⚡"
    } else if score >= 70 {
        "🟢"
    } else {
        "🟡"
    }
}

pub struct AlertContext<'a> {
    pub anomaly: &'a AnomalyDetected,
    pub quality: &'a QualityReport,
    pub question: &'a str,
    pub market_url: Option<&'a str>,
    pub paper_position: Option<&'a PaperPosition>,
    pub balance: Decimal,
    pub open_count: usize,
}

pub fn format_alert(ctx: &AlertContext<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    let score = ctx.quality.score;

    lines.push(format!(
        "{} <b>{:?}</b> [{score}/100]",
        quality_emoji(score),
        ctx.anomaly.anomaly_type,
    ));
    lines.push(html_escape(ctx.question));
    lines.push(String::new());

    match ctx.quality.hours_to_resolution {
        Some(h) if h < 48.0 => {
            lines.push(format!("{} · resolves in {h:.0}h", ctx.quality.market_type.label()))
        }
        Some(h) => lines.push(format!(
            "{} · resolves in {:.1} days",
            ctx.quality.market_type.label(),
            h / 24.0
        )),
        None => lines.push(format!("{} · no end date", ctx.quality.market_type.label())),
    }

    if let AnomalyDetails::CryptoEdge {
        symbol,
        spot_price,
        target_price,
        fair_value,
        market_price,
        edge,
        volatility,
        days_to_expiry,
        ..
    } = &ctx.anomaly.details
    {
        lines.push(String::new());
        lines.push(format!("{symbol} ${spot_price:.0} → target ${target_price:.0}"));
        lines.push(format!(
            "fair {fair_value:.2} vs market {market_price:.2} (edge {:.0}c)",
            edge.abs() * 100.0
        ));
        lines.push(format!(
            "vol {:.0}% · {days_to_expiry:.0}d to expiry",
            volatility * 100.0
        ));
    }

    if !ctx.quality.reasons.is_empty() {
        lines.push(String::new());
        for reason in ctx.quality.breakdown().split('|') {
            lines.push(format!("· {}", html_escape(reason.trim())));
        }
    }

    lines.push(String::new());
    lines.push(format!("Catalyst: {}", html_escape(&ctx.anomaly.description)));

    if let Some(signal) = ctx.anomaly.signal() {
        match ctx.anomaly.expected_roi() {
            Some(roi) => lines.push(format!(
                "<b>{}</b> — ROI: +{:.0}%",
                signal.label(),
                roi * 100.0
            )),
            None => lines.push(format!("<b>{}</b>", signal.label())),
        }
    }

    if let Some(pos) = ctx.paper_position {
        let total = ctx.balance + pos.size;
        let pct = if total > Decimal::ZERO {
            (pos.size / total * Decimal::from(100)).round_dp(1)
        } else {
            Decimal::ZERO
        };
        lines.push(String::new());
        lines.push("📋 Paper trade".to_string());
        lines.push(format!(
            "{} @ {} · ${} ({pct}% of portfolio)",
            pos.direction.label(),
            pos.entry_price,
            pos.size
        ));
        lines.push(format!(
            "balance {} · {} open",
            ctx.balance, ctx.open_count
        ));
    }

    if let Some(url) = ctx.market_url {
        lines.push(String::new());
        lines.push(format!("<a href=\"{url}\">View market</a>"));
    }

    lines.join("\n")
}
