use std::time::Duration;

use async_trait::async_trait;

/// Sleep abstraction so the poll loop's timing policy can be tested without
/// real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer. Dropping the future cancels the sleep, which is
/// how shutdown interrupts a waiting poller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
