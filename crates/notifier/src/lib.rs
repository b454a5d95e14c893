//! Notification delivery.
//!
//! A [`Notifier`] delivers one plain-text message per call, in the order it is
//! called. It does no queueing, batching or retrying; the poll loop decides
//! what a failed delivery means.

pub mod telegram;

use async_trait::async_trait;
use herald_common::error::WatchError;
use herald_common::types::NotificationMessage;

pub use telegram::TelegramNotifier;

/// A channel that accepts plain-text notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single message.
    async fn send(&self, message: &NotificationMessage) -> Result<(), WatchError>;

    /// Human-readable channel identity for logs (e.g. "telegram:12345").
    fn channel(&self) -> String;
}
