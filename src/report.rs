//! Daily paper-trading performance report.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use crate::alerts::transport::AlertTransport;
use crate::paper::{DailyReport, PaperTradingEngine};

pub fn format_daily_report(report: &DailyReport) -> String {
    let mut lines = vec![
        "📊 <b>Daily paper report</b>".to_string(),
        format!("balance {} · total pnl {}", report.balance, report.total_pnl),
        format!(
            "today: {} trades, {} wins ({:.0}% win rate)",
            report.trades_today,
            report.wins_today,
            report.win_rate * 100.0
        ),
        format!(
            "avg win {:+.1}% · avg loss {:+.1}%",
            report.avg_win_pct, report.avg_loss_pct
        ),
    ];

    if report.open_positions.is_empty() {
        lines.push("no open positions".to_string());
    } else {
        lines.push(format!("{} open:", report.open_positions.len()));
        for pos in &report.open_positions {
            lines.push(format!(
                "  {} {} @ {} (${})",
                pos.direction.label(),
                pos.market_id,
                pos.entry_price,
                pos.size
            ));
        }
    }

    if report.paused {
        lines.push(format!("⏸ paused (loss streak {})", report.loss_streak));
    } else if report.loss_streak > 0 {
        lines.push(format!("loss streak {}", report.loss_streak));
    }

    lines.join("\n")
}

/// Renders and sends the report once a day. Reports bypass the signal rate
/// limiter — they are operator telemetry, not signals.
pub fn spawn_daily_report_loop(
    paper: Arc<PaperTradingEngine>,
    transport: Arc<dyn AlertTransport>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
        interval.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = paper.daily_report().await;
                    let text = format_daily_report(&report);
                    info!("daily report:\n{text}");
                    if let Err(e) = transport.send(&text).await {
                        error!("daily report send failed: {e}");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    });
}
