use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WatchError;

/// Review states reported by the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Approved,
    Rejected,
    Reviewing,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Approved => write!(f, "approved"),
            ReviewStatus::Rejected => write!(f, "rejected"),
            ReviewStatus::Reviewing => write!(f, "reviewing"),
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            "reviewing" => Ok(ReviewStatus::Reviewing),
            other => Err(WatchError::UnknownStatus(other.to_string())),
        }
    }
}

/// A single status record exactly as the API returned it.
///
/// The record is kept as raw JSON so one malformed entry cannot fail the
/// decoding of its whole batch. Field presence and types are checked per item
/// by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStatusRecord(Value);

impl RawStatusRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// A field of the record; JSON `null` counts as absent.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Best-effort item name for logs and error reports, whatever its type.
    pub fn name_hint(&self) -> Option<String> {
        match self.field("homework_name")? {
            Value::String(name) if name.trim().is_empty() => None,
            Value::String(name) => Some(name.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A validated status record: a non-empty name and a recognized status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemStatus {
    pub name: String,
    pub status: ReviewStatus,
}

/// Decoded body of a poll response.
///
/// `homeworks` stays optional here: an absent list is a contract violation the
/// poll loop reports, not an empty batch. `current_date` is kept as sent; see
/// [`StatusPayload::cursor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub homeworks: Option<Vec<RawStatusRecord>>,
    #[serde(default)]
    pub current_date: Option<Value>,
}

impl StatusPayload {
    /// `current_date` as a watermark candidate.
    ///
    /// Any JSON number is accepted: fractions are truncated and negatives
    /// clamp to zero. Non-numeric values yield `None`.
    pub fn cursor(&self) -> Option<u64> {
        match self.current_date.as_ref()? {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_i64().map(|n| n.max(0) as u64))
                .or_else(|| number.as_f64().map(|n| n.max(0.0) as u64)),
            _ => None,
        }
    }
}

/// Cursor passed as `from_date` so the API only returns newer updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollWatermark(u64);

impl PollWatermark {
    pub const ZERO: PollWatermark = PollWatermark(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Move the watermark forward to `candidate`.
    ///
    /// Returns `true` if the watermark changed. Smaller or equal candidates
    /// are ignored; the watermark never regresses.
    pub fn advance(&mut self, candidate: u64) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for PollWatermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated outcome of one poll: the watermark after the poll and the
/// records to process, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub watermark: PollWatermark,
    pub items: Vec<RawStatusRecord>,
}

/// Plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage(String);

impl NotificationMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationMessage {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// What the poller does with the rest of a batch after one item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFailurePolicy {
    /// Record the failure and keep processing the remaining items.
    #[default]
    Isolate,
    /// Stop at the first failing item and skip the rest of the batch.
    Abort,
}

impl std::fmt::Display for ItemFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemFailurePolicy::Isolate => write!(f, "isolate"),
            ItemFailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for ItemFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolate" => Ok(ItemFailurePolicy::Isolate),
            "abort" => Ok(ItemFailurePolicy::Abort),
            other => Err(format!("unknown item failure policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_parse() {
        assert_eq!("approved".parse::<ReviewStatus>().unwrap(), ReviewStatus::Approved);
        assert_eq!("rejected".parse::<ReviewStatus>().unwrap(), ReviewStatus::Rejected);
        assert_eq!("reviewing".parse::<ReviewStatus>().unwrap(), ReviewStatus::Reviewing);
    }

    #[test]
    fn test_review_status_parse_unknown() {
        let err = "Approved".parse::<ReviewStatus>().unwrap_err();
        assert!(matches!(err, WatchError::UnknownStatus(ref s) if s == "Approved"));
    }

    #[test]
    fn test_watermark_never_regresses() {
        let mut watermark = PollWatermark::new(100);
        assert!(!watermark.advance(50));
        assert_eq!(watermark.value(), 100);
        assert!(!watermark.advance(100));
        assert!(watermark.advance(150));
        assert_eq!(watermark.value(), 150);
    }

    #[test]
    fn test_watermark_monotonic_over_sequence() {
        let mut watermark = PollWatermark::ZERO;
        let mut previous = watermark;
        for candidate in [10, 5, 30, 30, 0, 29, 31, 1] {
            watermark.advance(candidate);
            assert!(watermark >= previous);
            previous = watermark;
        }
        assert_eq!(watermark.value(), 31);
    }

    #[test]
    fn test_payload_deserialize_full() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"homeworks":[{"homework_name":"lab1","status":"approved","reviewer_comment":"ok"}],"current_date":100}"#,
        )
        .unwrap();
        let items = payload.homeworks.as_ref().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name_hint().as_deref(), Some("lab1"));
        assert_eq!(items[0].field("status"), Some(&Value::from("approved")));
        assert_eq!(payload.cursor(), Some(100));
    }

    #[test]
    fn test_payload_without_homeworks_keeps_none() {
        let payload: StatusPayload = serde_json::from_str(r#"{"current_date":7}"#).unwrap();
        assert!(payload.homeworks.is_none());
        assert_eq!(payload.cursor(), Some(7));
    }

    #[test]
    fn test_payload_rejects_non_object() {
        assert!(serde_json::from_str::<StatusPayload>("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_record_missing_and_null_fields_are_absent() {
        let record: RawStatusRecord =
            serde_json::from_str(r#"{"status":"rejected","homework_name":null}"#).unwrap();
        assert!(record.field("homework_name").is_none());
        assert!(record.name_hint().is_none());
        assert_eq!(record.field("status"), Some(&Value::from("rejected")));
    }

    #[test]
    fn test_mistyped_record_does_not_fail_the_batch() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"homeworks":[{"homework_name":"lab1","status":"approved"},{"homework_name":7,"status":"approved"},"oops"],"current_date":100}"#,
        )
        .unwrap();
        let items = payload.homeworks.as_ref().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].name_hint().as_deref(), Some("7"));
        assert!(!items[2].is_object());
        assert_eq!(payload.cursor(), Some(100));
    }

    #[test]
    fn test_cursor_accepts_any_number() {
        let cursor = |json: &str| serde_json::from_str::<StatusPayload>(json).unwrap().cursor();
        assert_eq!(cursor(r#"{"current_date":100.5}"#), Some(100));
        assert_eq!(cursor(r#"{"current_date":1.5e9}"#), Some(1_500_000_000));
        assert_eq!(cursor(r#"{"current_date":-20}"#), Some(0));
        assert_eq!(cursor(r#"{"current_date":null}"#), None);
        assert_eq!(cursor(r#"{"current_date":"100"}"#), None);
        assert_eq!(cursor(r#"{}"#), None);
    }

    #[test]
    fn test_item_failure_policy_parse() {
        assert_eq!(" Abort ".parse::<ItemFailurePolicy>().unwrap(), ItemFailurePolicy::Abort);
        assert_eq!("isolate".parse::<ItemFailurePolicy>().unwrap(), ItemFailurePolicy::Isolate);
        assert!("skip".parse::<ItemFailurePolicy>().is_err());
        assert_eq!(ItemFailurePolicy::default(), ItemFailurePolicy::Isolate);
    }
}
