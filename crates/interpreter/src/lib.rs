//! Status interpretation: turns raw status records into notification text.
//!
//! The interpreter is pure. It never sleeps, logs failures or talks to the
//! network; the poll loop decides what happens to an error it returns.

use herald_common::error::WatchError;
use herald_common::types::{NotificationMessage, RawStatusRecord, ReviewStatus, WorkItemStatus};
use serde_json::Value;

/// Maps validated status records to human-readable notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusInterpreter;

impl StatusInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Interpret one raw record.
    ///
    /// Fails with `MissingField("homework_name")` or `MissingField("status")`
    /// when a field is absent, and with `UnknownStatus` when the status is not
    /// one of the recognized values.
    pub fn interpret(&self, record: &RawStatusRecord) -> Result<NotificationMessage, WatchError> {
        let item = Self::validate(record)?;
        let message = Self::render(&item);

        tracing::debug!(
            name = %item.name,
            status = %item.status,
            "Interpreted status record"
        );

        Ok(message)
    }

    /// Check that both fields are present and the status is recognized.
    ///
    /// A record that is not a JSON object, or whose name is not a string, is a
    /// `Decode` error for that item alone. A non-string status is reported as
    /// an unknown status value.
    pub fn validate(record: &RawStatusRecord) -> Result<WorkItemStatus, WatchError> {
        if !record.is_object() {
            return Err(WatchError::Decode(format!(
                "status record is not an object: {}",
                record.as_value()
            )));
        }

        let name = match record.field("homework_name") {
            None => return Err(WatchError::missing_field("homework_name")),
            Some(Value::String(name)) if name.trim().is_empty() => {
                return Err(WatchError::missing_field("homework_name"));
            }
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(WatchError::Decode(format!(
                    "field \"homework_name\" must be a string, got {}",
                    other
                )));
            }
        };

        let status = match record.field("status") {
            None => return Err(WatchError::missing_field("status")),
            Some(Value::String(status)) => status.parse::<ReviewStatus>()?,
            Some(other) => return Err(WatchError::UnknownStatus(other.to_string())),
        };

        Ok(WorkItemStatus { name, status })
    }

    /// Header naming the item, a blank line, then the verdict.
    pub fn render(item: &WorkItemStatus) -> NotificationMessage {
        NotificationMessage::new(format!(
            "Your work \"{}\" has been checked!\n\n{}",
            item.name,
            Self::verdict(item.status)
        ))
    }

    /// Fixed verdict text for each review status.
    pub fn verdict(status: ReviewStatus) -> &'static str {
        match status {
            ReviewStatus::Approved => "The reviewer liked everything, the work is accepted!",
            ReviewStatus::Rejected => "Unfortunately, the reviewer found issues in the work.",
            ReviewStatus::Reviewing => "The work has been taken into review.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: Option<&str>, status: Option<&str>) -> RawStatusRecord {
        let mut fields = serde_json::Map::new();
        if let Some(name) = name {
            fields.insert("homework_name".into(), Value::from(name));
        }
        if let Some(status) = status {
            fields.insert("status".into(), Value::from(status));
        }
        RawStatusRecord::new(Value::Object(fields))
    }

    #[test]
    fn test_interpret_all_known_statuses() {
        let interpreter = StatusInterpreter::new();
        for status in [
            ReviewStatus::Approved,
            ReviewStatus::Rejected,
            ReviewStatus::Reviewing,
        ] {
            let message = interpreter
                .interpret(&record(Some("lab1"), Some(&status.to_string())))
                .unwrap();
            assert!(message.as_str().contains("\"lab1\""));
            assert!(message.as_str().contains(StatusInterpreter::verdict(status)));
        }
    }

    #[test]
    fn test_message_structure() {
        let message = StatusInterpreter::new()
            .interpret(&record(Some("lab1"), Some("approved")))
            .unwrap();
        let (header, verdict) = message.as_str().split_once("\n\n").unwrap();
        assert_eq!(header, "Your work \"lab1\" has been checked!");
        assert_eq!(verdict, StatusInterpreter::verdict(ReviewStatus::Approved));
    }

    #[test]
    fn test_verdicts_are_distinct() {
        let approved = StatusInterpreter::verdict(ReviewStatus::Approved);
        let rejected = StatusInterpreter::verdict(ReviewStatus::Rejected);
        let reviewing = StatusInterpreter::verdict(ReviewStatus::Reviewing);
        assert_ne!(approved, rejected);
        assert_ne!(rejected, reviewing);
        assert_ne!(approved, reviewing);
    }

    #[test]
    fn test_missing_name() {
        let err = StatusInterpreter::new()
            .interpret(&record(None, Some("approved")))
            .unwrap_err();
        assert_eq!(err, WatchError::missing_field("homework_name"));
    }

    #[test]
    fn test_blank_name_is_missing() {
        let err = StatusInterpreter::new()
            .interpret(&record(Some("   "), Some("approved")))
            .unwrap_err();
        assert_eq!(err, WatchError::missing_field("homework_name"));
    }

    #[test]
    fn test_missing_status() {
        let err = StatusInterpreter::new()
            .interpret(&record(Some("lab1"), None))
            .unwrap_err();
        assert_eq!(err, WatchError::missing_field("status"));
    }

    #[test]
    fn test_unknown_status() {
        let err = StatusInterpreter::new()
            .interpret(&record(Some("lab2"), Some("unknown_state")))
            .unwrap_err();
        assert_eq!(err, WatchError::UnknownStatus("unknown_state".to_string()));
    }

    #[test]
    fn test_interpret_from_wire_json() {
        let raw: RawStatusRecord =
            serde_json::from_str(r#"{"status":"rejected","homework_name":"lab3","id":9}"#)
                .unwrap();
        let message = StatusInterpreter::new().interpret(&raw).unwrap();
        assert!(message.as_str().contains("lab3"));
        assert!(message.as_str().ends_with(StatusInterpreter::verdict(ReviewStatus::Rejected)));
    }

    #[test]
    fn test_non_string_name_is_item_decode_error() {
        let raw = RawStatusRecord::new(serde_json::json!({"homework_name": 7, "status": "approved"}));
        let err = StatusInterpreter::new().interpret(&raw).unwrap_err();
        assert_eq!(
            err,
            WatchError::Decode("field \"homework_name\" must be a string, got 7".to_string())
        );
    }

    #[test]
    fn test_non_string_status_is_unknown() {
        let raw = RawStatusRecord::new(serde_json::json!({"homework_name": "lab1", "status": 3}));
        let err = StatusInterpreter::new().interpret(&raw).unwrap_err();
        assert_eq!(err, WatchError::UnknownStatus("3".to_string()));
    }

    #[test]
    fn test_null_name_is_missing() {
        let raw =
            RawStatusRecord::new(serde_json::json!({"homework_name": null, "status": "approved"}));
        let err = StatusInterpreter::new().interpret(&raw).unwrap_err();
        assert_eq!(err, WatchError::missing_field("homework_name"));
    }

    #[test]
    fn test_non_object_record_is_item_decode_error() {
        let raw = RawStatusRecord::new(serde_json::json!("lab1 approved"));
        let err = StatusInterpreter::new().interpret(&raw).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }
}
