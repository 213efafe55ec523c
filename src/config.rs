use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::feeds::CryptoFeedConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub alerting: AlertingConfig,
    pub paper: PaperConfig,
    pub auto_bet: AutoBetSettings,
    pub crypto_feed: CryptoFeedConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub min_severity: f64,
    pub dedup_minutes: i64,
    pub max_alerts_per_minute: usize,
    pub rate_limit_file: PathBuf,
    pub market_url_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    pub starting_balance: Decimal,
    pub trades_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBetSettings {
    pub enabled: bool,
    pub min_quality: u32,
    pub min_severity: f64,
    pub cooldown_minutes: i64,
    pub stake: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            min_severity: 0.5,
            dedup_minutes: 15,
            max_alerts_per_minute: 10,
            rate_limit_file: PathBuf::from("data/rate_limit.json"),
            market_url_base: Some("https://polymarket.com/market".into()),
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(1000),
            trades_file: PathBuf::from("data/paper_trades.json"),
        }
    }
}

impl Default for AutoBetSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_quality: 70,
            min_severity: 0.6,
            cooldown_minutes: 30,
            stake: dec!(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alerting: AlertingConfig::default(),
            paper: PaperConfig::default(),
            auto_bet: AutoBetSettings::default(),
            crypto_feed: CryptoFeedConfig::default(),
            telegram: TelegramConfig {
                bot_token: None,
                chat_id: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables (.env file) with
    /// defaults.
    ///
    /// Optional env vars:
    ///   MIN_SEVERITY, DEDUP_MINUTES, MAX_ALERTS_PER_MINUTE — alert gates
    ///   RATE_LIMIT_FILE, TRADES_FILE — state file paths
    ///   STARTING_BALANCE — paper portfolio start (default 1000)
    ///   MARKET_URL_BASE — base for "view market" links
    ///   CRYPTO_WS_URL — ticker stream endpoint
    ///   AUTO_BET_ENABLED, AUTO_BET_MIN_QUALITY, AUTO_BET_STAKE
    ///   TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID — chat transport
    ///   RUST_LOG — log filter (default: info)
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        if let Some(v) = env_parse::<f64>("MIN_SEVERITY") {
            config.alerting.min_severity = v;
        }
        if let Some(v) = env_parse::<i64>("DEDUP_MINUTES") {
            config.alerting.dedup_minutes = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_ALERTS_PER_MINUTE") {
            config.alerting.max_alerts_per_minute = v;
        }
        if let Some(v) = env_string("RATE_LIMIT_FILE") {
            config.alerting.rate_limit_file = PathBuf::from(v);
        }
        if let Some(v) = env_string("MARKET_URL_BASE") {
            config.alerting.market_url_base = Some(v);
        }

        if let Some(v) = env_parse::<Decimal>("STARTING_BALANCE") {
            config.paper.starting_balance = v;
        }
        if let Some(v) = env_string("TRADES_FILE") {
            config.paper.trades_file = PathBuf::from(v);
        }

        if let Some(v) = env_parse::<bool>("AUTO_BET_ENABLED") {
            config.auto_bet.enabled = v;
        }
        if let Some(v) = env_parse::<u32>("AUTO_BET_MIN_QUALITY") {
            config.auto_bet.min_quality = v;
        }
        if let Some(v) = env_parse::<Decimal>("AUTO_BET_STAKE") {
            config.auto_bet.stake = v;
        }

        if let Some(v) = env_string("CRYPTO_WS_URL") {
            config.crypto_feed.ws_url = v;
        }

        config.telegram.bot_token = env_string("TELEGRAM_BOT_TOKEN");
        config.telegram.chat_id = env_string("TELEGRAM_CHAT_ID");

        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.alerting.min_severity),
            "MIN_SEVERITY must be between 0 and 1"
        );
        anyhow::ensure!(
            self.alerting.dedup_minutes > 0,
            "DEDUP_MINUTES must be positive"
        );
        anyhow::ensure!(
            self.alerting.max_alerts_per_minute > 0,
            "MAX_ALERTS_PER_MINUTE must be positive"
        );
        anyhow::ensure!(
            self.paper.starting_balance > Decimal::ZERO,
            "STARTING_BALANCE must be positive"
        );
        url::Url::parse(&self.crypto_feed.ws_url)
            .map_err(|e| anyhow::anyhow!("CRYPTO_WS_URL is not a valid URL: {e}"))?;
        Ok(())
    }

    /// True when no chat credentials are configured — alerts go to the log.
    pub fn is_dry_run(&self) -> bool {
        self.telegram.bot_token.is_none() || self.telegram.chat_id.is_none()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().expect("defaults must be valid");
    }

    #[test]
    fn bad_severity_fails_validation() {
        let mut config = Config::default();
        config.alerting.min_severity = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_ws_url_fails_validation() {
        let mut config = Config::default();
        config.crypto_feed.ws_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn dry_run_without_credentials() {
        let config = Config::default();
        assert!(config.is_dry_run());
    }
}
