//! Persistent per-day signal rate limiting.
//!
//! The JSON file is the authoritative store across restarts: a process that
//! sent 3 alerts, died, and came back still has 2 left for the UTC day.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

pub const MAX_SIGNALS_PER_DAY: u32 = 5;
pub const MIN_SIGNAL_GAP_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    pub date: NaiveDate,
    pub today_count: u32,
    pub last_signal_time: Option<DateTime<Utc>>,
}

impl RateLimitState {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            today_count: 0,
            last_signal_time: None,
        }
    }
}

pub struct SignalRateLimiter {
    path: PathBuf,
    state: Mutex<RateLimitState>,
}

impl SignalRateLimiter {
    pub fn load_or_new(path: PathBuf) -> Self {
        let state = Self::load(&path).unwrap_or_else(|| RateLimitState::fresh(Utc::now().date_naive()));
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn load(path: &Path) -> Option<RateLimitState> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("unreadable rate-limit state at {}: {e} — resetting", path.display());
                None
            }
        }
    }

    fn persist(&self, state: &RateLimitState) {
        let write = || -> anyhow::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(state)?;
            let tmp = self.path.with_extension("json.tmp");
            fs::write(&tmp, json)?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        };
        if let Err(e) = write() {
            error!("rate-limit state save failed: {e:#}");
        }
    }

    /// Whether a signal may be sent at `now`. Does not reserve the slot —
    /// call `commit` after the transport succeeds.
    pub async fn allow(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;

        if state.date != now.date_naive() {
            *state = RateLimitState::fresh(now.date_naive());
            self.persist(&state);
        }

        if state.today_count >= MAX_SIGNALS_PER_DAY {
            debug!("rate limit: {} signals already sent today", state.today_count);
            return false;
        }

        if let Some(last) = state.last_signal_time {
            let gap = now - last;
            if gap < Duration::minutes(MIN_SIGNAL_GAP_MINUTES) {
                debug!("rate limit: only {}m since last signal", gap.num_minutes());
                return false;
            }
        }

        true
    }

    /// Record a successfully transported signal.
    pub async fn commit(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if state.date != now.date_naive() {
            *state = RateLimitState::fresh(now.date_naive());
        }
        state.today_count += 1;
        state.last_signal_time = Some(now);
        self.persist(&state);
    }

    pub async fn today_count(&self) -> u32 {
        self.state.lock().await.today_count
    }
}
