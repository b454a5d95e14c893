use std::time::Duration;

use crate::types::{ItemFailurePolicy, PollWatermark};

const DEFAULT_STATUS_API_URL: &str = "https://praktikum.yandex.ru/api/user_api/homework_statuses/";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Where the first poll starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialWatermark {
    /// A fixed cursor value (`0` asks for the full history).
    At(u64),
    /// The current unix time at startup.
    Now,
}

impl InitialWatermark {
    pub fn resolve(self) -> PollWatermark {
        match self {
            InitialWatermark::At(value) => PollWatermark::new(value),
            InitialWatermark::Now => {
                PollWatermark::new(chrono::Utc::now().timestamp().max(0) as u64)
            }
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Status API endpoint
    pub status_api_url: String,

    /// OAuth token for the status API
    pub status_api_token: String,

    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Chat that receives every notification
    pub telegram_chat_id: String,

    /// Sleep after a clean iteration, in seconds (default: 600)
    pub poll_period_secs: u64,

    /// Sleep after a failed iteration, in seconds (default: 1740)
    pub error_period_secs: u64,

    /// Per-request HTTP timeout, in seconds (default: 30)
    pub request_timeout_secs: u64,

    pub initial_watermark: InitialWatermark,

    pub item_failure_policy: ItemFailurePolicy,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };
        let seconds = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a valid u64", key)),
                None => Ok(default),
            }
        };

        let initial_watermark = match lookup("INITIAL_WATERMARK") {
            None => InitialWatermark::At(0),
            Some(raw) if raw.trim().eq_ignore_ascii_case("now") => InitialWatermark::Now,
            Some(raw) => InitialWatermark::At(raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("INITIAL_WATERMARK must be a valid u64 or \"now\"")
            })?),
        };

        let item_failure_policy = match lookup("ITEM_FAILURE_POLICY") {
            None => ItemFailurePolicy::default(),
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow::anyhow!("ITEM_FAILURE_POLICY: {}", e))?,
        };

        let config = Self {
            status_api_url: lookup("STATUS_API_URL")
                .unwrap_or_else(|| DEFAULT_STATUS_API_URL.to_string()),
            status_api_token: required("STATUS_API_TOKEN")?,
            telegram_api_url: lookup("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required("TELEGRAM_CHAT_ID")?,
            poll_period_secs: seconds("POLL_PERIOD_SECS", 600)?,
            error_period_secs: seconds("ERROR_PERIOD_SECS", 29 * 60)?,
            request_timeout_secs: seconds("REQUEST_TIMEOUT_SECS", 30)?,
            initial_watermark,
            item_failure_policy,
        };

        if config.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        if config.error_period_secs < config.poll_period_secs {
            tracing::warn!(
                poll_period_secs = config.poll_period_secs,
                error_period_secs = config.error_period_secs,
                "Error period is shorter than the poll period; a failing API will be polled more often"
            );
        }

        Ok(config)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }

    pub fn error_period(&self) -> Duration {
        Duration::from_secs(self.error_period_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
