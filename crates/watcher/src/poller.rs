//! The poll loop.
//!
//! One iteration polls the status API, interprets every returned record and
//! delivers the resulting messages. Any failure along the way is logged,
//! reported to the chat on a best-effort basis and followed by the longer
//! error sleep. Nothing inside an iteration can stop the loop.
//!
//! States per iteration:
//!
//! ```text
//! Idle -> Polling -> Processing -> Sleeping(Normal)   clean iteration
//! Idle -> Polling -> Sleeping(Error)                  poll failed
//! Idle -> Polling -> Processing -> Sleeping(Error)    an item failed
//! ```

use std::time::Duration;

use herald_common::config::AppConfig;
use herald_common::error::WatchError;
use herald_common::types::{
    ItemFailurePolicy, NotificationMessage, PollResult, PollWatermark, RawStatusRecord,
};
use herald_interpreter::StatusInterpreter;
use herald_notifier::Notifier;

use crate::client::StatusSource;
use crate::sleeper::{Sleeper, TokioSleeper};

/// Timing and failure policy for the poller.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub poll_period: Duration,
    pub error_period: Duration,
    pub item_failure_policy: ItemFailurePolicy,
    pub initial_watermark: PollWatermark,
}

impl PollerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_period: config.poll_period(),
            error_period: config.error_period(),
            item_failure_policy: config.item_failure_policy,
            initial_watermark: config.initial_watermark.resolve(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(10 * 60),
            error_period: Duration::from_secs(29 * 60),
            item_failure_policy: ItemFailurePolicy::Isolate,
            initial_watermark: PollWatermark::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepKind {
    Normal,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Processing,
    Sleeping(SleepKind),
}

/// One failure within an iteration, with the item it belongs to if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationFailure {
    /// Name of the failing item; `None` for poll-level failures or unnamed items.
    pub item: Option<String>,
    pub error: WatchError,
}

impl IterationFailure {
    /// Text sent to the chat for this failure.
    pub fn notification(&self) -> NotificationMessage {
        match &self.item {
            Some(item) => NotificationMessage::new(format!(
                "Watcher failed on \"{}\" with error: {}",
                item, self.error
            )),
            None => NotificationMessage::new(format!("Watcher failed with error: {}", self.error)),
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Status messages delivered to the chat.
    pub delivered: usize,
    /// Items left unprocessed because the batch was aborted.
    pub skipped: usize,
    /// Every failure hit during the iteration, in order.
    pub failures: Vec<IterationFailure>,
}

impl IterationOutcome {
    fn failed(error: WatchError) -> Self {
        Self {
            failures: vec![IterationFailure { item: None, error }],
            ..Self::default()
        }
    }

    /// The errors of every failure, without item context.
    pub fn errors(&self) -> Vec<WatchError> {
        self.failures.iter().map(|f| f.error.clone()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn sleep_kind(&self) -> SleepKind {
        if self.is_success() {
            SleepKind::Normal
        } else {
            SleepKind::Error
        }
    }
}

/// Polls the status API forever and forwards every status change to the
/// notifier.
///
/// The watermark is owned here and only moves forward.
pub struct StatusPoller {
    source: Box<dyn StatusSource>,
    interpreter: StatusInterpreter,
    notifier: Box<dyn Notifier>,
    sleeper: Box<dyn Sleeper>,
    settings: PollerSettings,
    watermark: PollWatermark,
    state: PollerState,
}

impl StatusPoller {
    pub fn new(
        source: Box<dyn StatusSource>,
        notifier: Box<dyn Notifier>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            interpreter: StatusInterpreter::new(),
            notifier,
            sleeper: Box::new(TokioSleeper),
            watermark: settings.initial_watermark,
            settings,
            state: PollerState::Idle,
        }
    }

    /// Replace the sleeper (tests use one that records instead of waiting).
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn watermark(&self) -> PollWatermark {
        self.watermark
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Start the polling loop. Runs until the surrounding task is dropped.
    pub async fn run(&mut self) {
        tracing::info!(
            channel = %self.notifier.channel(),
            watermark = %self.watermark,
            poll_period_secs = self.settings.poll_period.as_secs(),
            error_period_secs = self.settings.error_period.as_secs(),
            item_failure_policy = %self.settings.item_failure_policy,
            "Status poller started"
        );

        loop {
            self.tick().await;
        }
    }

    /// Run one iteration, report its failures and sleep the matching period.
    pub async fn tick(&mut self) -> IterationOutcome {
        let outcome = self.iterate().await;

        for failure in &outcome.failures {
            self.report_failure(failure).await;
        }

        let kind = outcome.sleep_kind();
        let period = match kind {
            SleepKind::Normal => self.settings.poll_period,
            SleepKind::Error => self.settings.error_period,
        };

        self.state = PollerState::Sleeping(kind);
        tracing::debug!(
            delivered = outcome.delivered,
            skipped = outcome.skipped,
            failures = outcome.failures.len(),
            sleep_secs = period.as_secs(),
            "Iteration finished, sleeping"
        );
        self.sleeper.sleep(period).await;
        self.state = PollerState::Idle;

        outcome
    }

    /// Poll once and process the returned batch, without sleeping or
    /// reporting.
    pub async fn iterate(&mut self) -> IterationOutcome {
        self.state = PollerState::Polling;
        tracing::debug!(watermark = %self.watermark, "Poll iteration started");

        let result = match self.poll().await {
            Ok(result) => result,
            Err(e) => return IterationOutcome::failed(e),
        };

        self.state = PollerState::Processing;
        tracing::debug!(
            watermark = %result.watermark,
            items = result.items.len(),
            "Processing status batch"
        );
        self.process(&result.items).await
    }

    /// Poll the source, adopt the returned watermark and check the batch is
    /// present.
    async fn poll(&mut self) -> Result<PollResult, WatchError> {
        let payload = self.source.poll(self.watermark).await?;

        // Adopted before the items are checked, so a batch that later fails
        // is not fetched again.
        match payload.cursor() {
            Some(cursor) => {
                if self.watermark.advance(cursor) {
                    tracing::debug!(watermark = %self.watermark, "Watermark advanced");
                }
            }
            None => {
                if let Some(raw) = &payload.current_date {
                    tracing::warn!(current_date = %raw, "Ignoring non-numeric current_date");
                }
            }
        }

        let items = payload
            .homeworks
            .ok_or_else(|| WatchError::missing_field("homeworks"))?;

        Ok(PollResult {
            watermark: self.watermark,
            items,
        })
    }

    async fn process(&self, items: &[RawStatusRecord]) -> IterationOutcome {
        let mut outcome = IterationOutcome::default();

        for (index, record) in items.iter().enumerate() {
            match self.deliver(record).await {
                Ok(()) => outcome.delivered += 1,
                Err(error) => {
                    let item = record.name_hint();
                    tracing::warn!(
                        index,
                        name = item.as_deref().unwrap_or("<missing>"),
                        error = %error,
                        "Status item failed"
                    );
                    outcome.failures.push(IterationFailure { item, error });

                    if self.settings.item_failure_policy == ItemFailurePolicy::Abort {
                        outcome.skipped = items.len() - index - 1;
                        break;
                    }
                }
            }
        }

        outcome
    }

    async fn deliver(&self, record: &RawStatusRecord) -> Result<(), WatchError> {
        let message = self.interpreter.interpret(record)?;
        self.notifier.send(&message).await?;

        tracing::info!(
            channel = %self.notifier.channel(),
            name = record.name_hint().as_deref().unwrap_or_default(),
            "Status delivered"
        );
        Ok(())
    }

    /// Log a failure and tell the chat about it. Delivery problems here are
    /// logged and swallowed.
    async fn report_failure(&self, failure: &IterationFailure) {
        let err = &failure.error;
        tracing::error!(
            kind = err.kind(),
            item = failure.item.as_deref(),
            error = ?err,
            watermark = %self.watermark,
            "Poll iteration failed"
        );

        let message = failure.notification();
        match self.notifier.send(&message).await {
            Ok(()) => tracing::info!(
                channel = %self.notifier.channel(),
                kind = err.kind(),
                "Error notification delivered"
            ),
            Err(send_err) => tracing::error!(
                channel = %self.notifier.channel(),
                error = %send_err,
                original = %err,
                "Failed to deliver error notification"
            ),
        }
    }
}
