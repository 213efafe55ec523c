use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a binary market held by a paper position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Yes,
    No,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Yes => "YES",
            Direction::No => "NO",
        }
    }
}

/// An open simulated position. `size` is the dollars reserved from the
/// balance; `shares` is the virtual share count at entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub market_id: String,
    pub question: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub shares: Decimal,
    pub quality_score: u32,
    pub catalyst: String,
    pub hours_to_resolution: Option<f64>,
    pub entry_time: DateTime<Utc>,
}

impl PaperPosition {
    /// Fractional unrealized P&L at `current_price` (e.g. -0.40 = down 40%).
    pub fn unrealized_pnl_pct(&self, current_price: Decimal) -> Decimal {
        if self.size.is_zero() {
            return Decimal::ZERO;
        }
        (self.shares * current_price - self.size) / self.size
    }
}

/// A closed simulated trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTrade {
    pub market_id: String,
    pub question: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub shares: Decimal,
    pub quality_score: u32,
    pub catalyst: String,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub exit_reason: String,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub is_win: bool,
    pub balance_after: Decimal,
}

/// Durable portfolio state, written as pretty JSON on every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperState {
    pub balance: Decimal,
    pub open_positions: Vec<PaperPosition>,
    pub closed_trades: Vec<PaperTrade>,
    pub traded_market_ids: Vec<String>,
    pub loss_streak: u32,
    pub paused: bool,
    pub paused_until: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(entry: Decimal, size: Decimal) -> PaperPosition {
        let shares = (size / entry).round_dp(2);
        PaperPosition {
            market_id: "m1".into(),
            question: "Will it?".into(),
            direction: Direction::Yes,
            entry_price: entry,
            size,
            shares,
            quality_score: 70,
            catalyst: "test".into(),
            hours_to_resolution: None,
            entry_time: Utc::now(),
        }
    }

    #[test]
    fn unrealized_pnl_pct_at_entry_is_flat() {
        let pos = position(dec!(0.40), dec!(20));
        let pct = pos.unrealized_pnl_pct(dec!(0.40));
        assert!(pct.abs() < dec!(0.001), "flat at entry, got {pct}");
    }

    #[test]
    fn unrealized_pnl_pct_tracks_price() {
        let pos = position(dec!(0.40), dec!(20));
        // 50 shares at 0.60 = $30 → +50%
        let pct = pos.unrealized_pnl_pct(dec!(0.60));
        assert_eq!(pct, dec!(0.5));
    }
}
