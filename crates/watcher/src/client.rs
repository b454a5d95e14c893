use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use herald_common::error::WatchError;
use herald_common::types::{PollWatermark, StatusPayload};

/// Anything that can answer "what changed since this watermark?".
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch updates newer than `watermark`.
    ///
    /// The payload is returned as decoded; checking that `homeworks` is present
    /// is the caller's job.
    async fn poll(&self, watermark: PollWatermark) -> Result<StatusPayload, WatchError>;
}

/// HTTP client for the review status API.
pub struct StatusClient {
    client: Client,
    api_url: String,
    token: String,
}

impl StatusClient {
    /// Create a client with the given per-request timeout.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WatchError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn poll(&self, watermark: PollWatermark) -> Result<StatusPayload, WatchError> {
        let response = self
            .client
            .get(&self.api_url)
            .header("Authorization", format!("OAuth {}", self.token))
            .query(&[("from_date", watermark.value())])
            .send()
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(
                code = status.as_u16(),
                from_date = watermark.value(),
                "Status API returned an unexpected code"
            );
            return Err(WatchError::server(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        let payload: StatusPayload = serde_json::from_str(&body)
            .map_err(|e| WatchError::Decode(format!("invalid status payload: {}", e)))?;

        tracing::debug!(
            from_date = watermark.value(),
            items = payload.homeworks.as_ref().map(Vec::len),
            cursor = payload.cursor(),
            "Polled status API"
        );

        Ok(payload)
    }
}
