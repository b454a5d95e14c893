use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use herald_common::error::WatchError;
use herald_common::types::NotificationMessage;

use crate::Notifier;

/// Body of a Bot API `sendMessage` call.
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

/// Delivers notifications to a single Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier for `chat_id` with its own HTTP client.
    pub fn new(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WatchError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, api_url, bot_token, chat_id))
    }

    /// Create a notifier that reuses an existing HTTP client.
    pub fn with_client(
        client: Client,
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &NotificationMessage) -> Result<(), WatchError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message.as_str(),
        };

        // reqwest errors carry the full URL, which contains the bot token.
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| WatchError::from(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WatchError::from(e.without_url()))?;

        let parsed = serde_json::from_str::<BotApiResponse>(&body);

        if !status.is_success() {
            if let Ok(api) = &parsed {
                tracing::warn!(
                    chat_id = %self.chat_id,
                    code = status.as_u16(),
                    description = api.description.as_deref().unwrap_or(""),
                    "Telegram rejected the message"
                );
            }
            return Err(WatchError::server(status.as_u16()));
        }

        let api = parsed?;
        if !api.ok {
            let code = api.error_code.unwrap_or(status.as_u16());
            return Err(WatchError::Server {
                code,
                reason: api
                    .description
                    .unwrap_or_else(|| "Telegram reported failure".to_string()),
            });
        }

        tracing::debug!(chat_id = %self.chat_id, "Telegram message accepted");
        Ok(())
    }

    fn channel(&self) -> String {
        format!("telegram:{}", self.chat_id)
    }
}
