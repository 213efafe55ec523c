use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API rejected message: {0}")]
    Rejected(String),
}

/// Outbound chat transport seam. The dispatcher only sees this trait; a
/// failed send is logged and swallowed upstream.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), TransportError>;
}

/// Telegram sendMessage transport with bounded retries.
pub struct TelegramTransport {
    token: String,
    chat_id: String,
    http: reqwest::Client,
}

impl TelegramTransport {
    const MAX_ATTEMPTS: u32 = 3;

    pub fn new(token: String, chat_id: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("failed to build HTTP client");
        Self {
            token,
            chat_id,
            http,
        }
    }

    async fn send_once(&self, text: &str) -> Result<(), TransportError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(TransportError::Rejected(format!("{status}: {detail}")))
        }
    }
}

#[async_trait]
impl AlertTransport for TelegramTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut backoff_ms = 500u64;
        let mut last_err = None;

        for attempt in 1..=Self::MAX_ATTEMPTS {
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("telegram send attempt {attempt}/{} failed: {e}", Self::MAX_ATTEMPTS);
                    last_err = Some(e);
                    if attempt < Self::MAX_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                        backoff_ms *= 2;
                    }
                }
            }
        }

        Err(last_err.expect("at least one attempt ran"))
    }
}

/// Logs messages instead of sending them. Used when no chat credentials
/// are configured.
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        info!("ALERT (dry-run):\n{text}");
        Ok(())
    }
}
