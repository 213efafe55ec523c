//! Extracts (symbol, target, direction, expiry) from free-text market questions.
//!
//! "Will Bitcoin be above $110,000 on March 31, 2026?" →
//!   { BTC, 110000, above, 2026-03-31 }

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

const SYMBOL_ALIASES: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("btc", "BTC"),
    ("ethereum", "ETH"),
    ("eth", "ETH"),
    ("ether", "ETH"),
    ("solana", "SOL"),
    ("sol", "SOL"),
    ("dogecoin", "DOGE"),
    ("doge", "DOGE"),
    ("xrp", "XRP"),
    ("ripple", "XRP"),
    ("polygon", "MATIC"),
    ("matic", "MATIC"),
    ("sui", "SUI"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoMarketMatch {
    pub symbol: String,
    pub target_price: f64,
    pub is_above: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl CryptoMarketMatch {
    /// Canonical rendering; parsing it reproduces the same match.
    pub fn canonical_question(&self) -> String {
        let direction = if self.is_above { "above" } else { "below" };
        let price = if self.target_price.fract() == 0.0 {
            format!("{:.0}", self.target_price)
        } else {
            format!("{}", self.target_price)
        };
        match self.expiry_date {
            Some(d) => format!(
                "Will {} be {} ${} on {}?",
                self.symbol,
                direction,
                price,
                d.format("%B %-d, %Y")
            ),
            None => format!("Will {} be {} ${}?", self.symbol, direction, price),
        }
    }
}

pub struct CryptoMarketMatcher {
    word_re: Regex,
    price_re: Regex,
    below_re: Regex,
    above_re: Regex,
    prefixed_date_re: Regex,
    bare_date_re: Regex,
    ordinal_re: Regex,
}

impl Default for CryptoMarketMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoMarketMatcher {
    pub fn new() -> Self {
        Self {
            word_re: Regex::new(r"[A-Za-z]+").expect("valid regex"),
            price_re: Regex::new(r"\$([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmM])?\b")
                .expect("valid regex"),
            below_re: Regex::new(
                r"(?i)\b(below|under|less than|lower than|drop to|fall to|dip to|beneath|crash to)\b",
            )
            .expect("valid regex"),
            above_re: Regex::new(
                r"(?i)\b(above|over|exceed|hit|reach|surpass|higher than|more than|at least)\b",
            )
            .expect("valid regex"),
            prefixed_date_re: Regex::new(
                r"(?i)\b(?:on|by|before)\s+([A-Za-z]+\s+[0-9]{1,2}(?:st|nd|rd|th)?(?:,?\s*[0-9]{4})?)",
            )
            .expect("valid regex"),
            bare_date_re: Regex::new(
                r"\b([A-Z][a-z]+\s+[0-9]{1,2}(?:st|nd|rd|th)?,\s*[0-9]{4})",
            )
            .expect("valid regex"),
            ordinal_re: Regex::new(r"([0-9]{1,2})(?:st|nd|rd|th)").expect("valid regex"),
        }
    }

    pub fn parse(&self, question: &str, now: DateTime<Utc>) -> Option<CryptoMarketMatch> {
        let symbol = self.extract_symbol(question)?;
        let target_price = self.extract_price(question)?;
        let is_above = self.extract_direction(question);
        let expiry_date = self.extract_expiry(question, now);

        Some(CryptoMarketMatch {
            symbol,
            target_price,
            is_above,
            expiry_date,
        })
    }

    /// First whole word matching the alias table, scanning left to right.
    fn extract_symbol(&self, question: &str) -> Option<String> {
        for word in self.word_re.find_iter(question) {
            let lower = word.as_str().to_lowercase();
            if let Some((_, symbol)) = SYMBOL_ALIASES.iter().find(|(alias, _)| *alias == lower) {
                return Some((*symbol).to_string());
            }
        }
        None
    }

    /// First `$<amount>` occurrence, comma-stripped, with k/m suffix applied.
    fn extract_price(&self, question: &str) -> Option<f64> {
        let caps = self.price_re.captures(question)?;
        let raw = caps.get(1)?.as_str().replace(',', "");
        let mut value: f64 = raw.parse().ok()?;
        match caps.get(2).map(|m| m.as_str().to_lowercase()) {
            Some(s) if s == "k" => value *= 1_000.0,
            Some(s) if s == "m" => value *= 1_000_000.0,
            _ => {}
        }
        if value > 0.0 {
            Some(value)
        } else {
            None
        }
    }

    /// Below keywords win over above keywords; no keyword defaults to above.
    fn extract_direction(&self, question: &str) -> bool {
        if self.below_re.is_match(question) {
            return false;
        }
        if self.above_re.is_match(question) {
            return true;
        }
        // No directional keyword at all — questions phrase these as above bets.
        true
    }

    fn extract_expiry(&self, question: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let phrase = self
            .prefixed_date_re
            .captures(question)
            .or_else(|| self.bare_date_re.captures(question))
            .and_then(|c| c.get(1))?
            .as_str();
        self.parse_date_phrase(phrase, now)
    }

    fn parse_date_phrase(&self, phrase: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let cleaned = self.ordinal_re.replace_all(phrase, "$1");
        let cleaned = cleaned.trim();

        // Explicit year: honored as parsed.
        for fmt in ["%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(cleaned, fmt) {
                return Self::to_utc(date);
            }
        }

        // No year: current year, bumped to the next occurrence when past.
        let with_year = format!("{} {}", cleaned, now.year());
        for fmt in ["%B %d %Y", "%b %d %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(&with_year, fmt) {
                let date = if date < now.date_naive() {
                    date.with_year(date.year() + 1)?
                } else {
                    date
                };
                return Self::to_utc(date);
            }
        }

        None
    }

    fn to_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
        date.and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CryptoMarketMatcher {
        CryptoMarketMatcher::new()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_full_question_with_year() {
        let m = matcher()
            .parse(
                "Will Bitcoin be above $110,000 on March 31, 2026?",
                at(2026, 1, 30),
            )
            .expect("should match");
        assert_eq!(m.symbol, "BTC");
        assert_eq!(m.target_price, 110_000.0);
        assert!(m.is_above);
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
        );
    }

    #[test]
    fn parses_k_suffix_and_by_date() {
        let m = matcher()
            .parse("ETH hit $4k by June 30, 2025", at(2025, 1, 15))
            .expect("should match");
        assert_eq!(m.symbol, "ETH");
        assert_eq!(m.target_price, 4_000.0);
        assert!(m.is_above, "'hit' is an above keyword");
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
        );
    }

    #[test]
    fn yearless_past_date_bumps_to_next_occurrence() {
        let m = matcher()
            .parse("Will BTC dip to $80,000 before Feb 28?", at(2025, 6, 1))
            .expect("should match");
        assert_eq!(m.target_price, 80_000.0);
        assert!(!m.is_above, "'dip to' is a below keyword");
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            "Feb 28 already passed in 2025 — next occurrence"
        );
    }

    #[test]
    fn unknown_symbol_means_no_match() {
        let m = matcher().parse("Will the S&P close above 6000 this year?", at(2025, 6, 1));
        assert!(m.is_none(), "S&P is not in the alias table");
    }

    #[test]
    fn missing_price_means_no_match() {
        let m = matcher().parse("Will Bitcoin moon this year?", at(2025, 6, 1));
        assert!(m.is_none());
    }

    #[test]
    fn below_beats_above_and_substring_does_not_trigger() {
        let m = matcher()
            .parse("Will SOL recover and drop to $80 under pressure?", at(2025, 6, 1))
            .unwrap();
        // "recover" must not match "over"; "drop to"/"under" make it below.
        assert!(!m.is_above);
    }

    #[test]
    fn no_direction_keyword_defaults_to_above() {
        let m = matcher().parse("DOGE at $0.50?", at(2025, 6, 1)).unwrap();
        assert_eq!(m.symbol, "DOGE");
        assert_eq!(m.target_price, 0.50);
        assert!(m.is_above);
    }

    #[test]
    fn m_suffix_scales_to_millions() {
        let m = matcher().parse("Will BTC reach $1m?", at(2025, 6, 1)).unwrap();
        assert_eq!(m.target_price, 1_000_000.0);
    }

    #[test]
    fn parse_is_idempotent_through_canonical_rendering() {
        let matcher = matcher();
        let now = at(2026, 1, 30);
        for question in [
            "Will Bitcoin be above $110,000 on March 31, 2026?",
            "ETH hit $4k by June 30, 2027",
            "Will ripple fall to $1.50?",
        ] {
            let first = matcher.parse(question, now).expect("should match");
            let second = matcher
                .parse(&first.canonical_question(), now)
                .expect("canonical rendering should re-match");
            assert_eq!(first, second, "round-trip changed the match for {question}");
        }
    }
}
