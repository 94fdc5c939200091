//! Messages: one classified log record.

use std::fmt;

use jiff::Timestamp;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::decode::Record;

use super::keys::{ACTION_STATUS, ACTION_TYPE, MESSAGE_TYPE, TASK_LEVEL, TASK_UUID, TIMESTAMP};
use super::{Status, TaskLevel};

/// Keys removed from a record's payload when it becomes a message.
/// A structural key set to `null` counts as absent and stays in the payload.
const STRUCTURAL_KEYS: [&str; 5] = [TASK_UUID, TASK_LEVEL, TIMESTAMP, MESSAGE_TYPE, ACTION_TYPE];

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Errors that can occur while turning a record into a message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("could not determine message kind: {reason}")]
    AmbiguousKind { record: Box<Record>, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Structural classification of a log entry.
///
/// Every entry is a plain message, the start of an action, or the end of
/// one. Ends always carry a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Message,
    ActionStart,
    ActionEnd(Status),
}

/// Classify a record and extract its entry type.
///
/// Start and end records are tagged with `action_type` and always yield
/// an entry type. Plain messages may or may not have a `message_type`.
pub fn classify(record: &Record) -> Result<(MessageKind, Option<String>), ParseError> {
    let Some(action_type) = present(record, ACTION_TYPE) else {
        let message_type = present(record, MESSAGE_TYPE)
            .map(|value| string_field(MESSAGE_TYPE, value))
            .transpose()?;
        return Ok((MessageKind::Message, message_type));
    };

    if present(record, MESSAGE_TYPE).is_some() {
        return Err(ambiguous(record, "action_type and message_type both present"));
    }

    let status = record.get(ACTION_STATUS);
    let kind = match status.and_then(Value::as_str).and_then(|s| s.parse::<Status>().ok()) {
        Some(Status::Started) => MessageKind::ActionStart,
        Some(terminal) => MessageKind::ActionEnd(terminal),
        None => {
            let reason = match status {
                Some(value) => format!("unrecognized action_status: {value}"),
                None => "action_type present without action_status".to_string(),
            };
            return Err(ambiguous(record, &reason));
        }
    };

    Ok((kind, Some(string_field(ACTION_TYPE, action_type)?)))
}

/// A parsed log entry.
///
/// Immutable once built: the structural keys live in typed fields and
/// whatever else the producer wrote stays in [`Message::fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    task_uuid: Option<String>,
    task_level: Option<TaskLevel>,
    timestamp: Option<Timestamp>,
    entry_type: Option<String>,
    kind: MessageKind,
    fields: Record,
}

impl Message {
    /// Parse a decoded record. The record itself is left untouched.
    pub fn new(record: &Record) -> Result<Self, ParseError> {
        let (kind, entry_type) = classify(record)?;

        let task_uuid = present(record, TASK_UUID)
            .map(|value| string_field(TASK_UUID, value))
            .transpose()?;
        let task_level = present(record, TASK_LEVEL)
            .map(|value| {
                TaskLevel::from_value(value).map_err(|reason| ParseError::InvalidField {
                    field: TASK_LEVEL,
                    reason,
                })
            })
            .transpose()?;
        let timestamp = present(record, TIMESTAMP).map(parse_timestamp).transpose()?;

        let fields = record
            .iter()
            .filter(|(key, value)| value.is_null() || !STRUCTURAL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            task_uuid,
            task_level,
            timestamp,
            entry_type,
            kind,
            fields,
        })
    }

    pub fn task_uuid(&self) -> Option<&str> {
        self.task_uuid.as_deref()
    }

    pub fn task_level(&self) -> Option<&TaskLevel> {
        self.task_level.as_ref()
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub fn entry_type(&self) -> Option<&str> {
        self.entry_type.as_deref()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The payload: everything but the structural keys that carried a value.
    pub fn fields(&self) -> &Record {
        &self.fields
    }

    /// The action status this entry reports, if it is a start or end.
    pub fn status(&self) -> Option<Status> {
        match self.kind {
            MessageKind::Message => None,
            MessageKind::ActionStart => Some(Status::Started),
            MessageKind::ActionEnd(status) => Some(status),
        }
    }

    /// Flatten back into a record: payload plus whichever structural keys
    /// are known.
    ///
    /// The timestamp is re-encoded from its parsed form as epoch seconds,
    /// so it need not match the original number exactly.
    pub fn as_dict(&self) -> Record {
        let mut record = self.fields.clone();
        if let Some(task_uuid) = &self.task_uuid {
            record.insert(TASK_UUID.to_string(), Value::from(task_uuid.as_str()));
        }
        if let Some(task_level) = &self.task_level {
            record.insert(TASK_LEVEL.to_string(), task_level.to_value());
        }
        if let Some(timestamp) = self.timestamp {
            record.insert(TIMESTAMP.to_string(), encode_timestamp(timestamp));
        }
        if let Some(entry_type) = &self.entry_type {
            let key = match self.kind {
                MessageKind::Message => MESSAGE_TYPE,
                MessageKind::ActionStart | MessageKind::ActionEnd(_) => ACTION_TYPE,
            };
            record.insert(key.to_string(), Value::from(entry_type.as_str()));
        }
        record
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_dict().serialize(serializer)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry_type = self.entry_type.as_deref().unwrap_or("<untyped>");
        let task = self.task_uuid.as_deref().unwrap_or("<no task>");
        match &self.task_level {
            Some(level) => write!(f, "{entry_type} ({task}{level})"),
            None => write!(f, "{entry_type} ({task})"),
        }
    }
}

fn ambiguous(record: &Record, reason: &str) -> ParseError {
    ParseError::AmbiguousKind {
        record: Box::new(record.clone()),
        reason: reason.to_string(),
    }
}

/// The value under `key`, treating `null` as absent.
fn present<'a>(record: &'a Record, key: &str) -> Option<&'a Value> {
    record.get(key).filter(|value| !value.is_null())
}

fn string_field(field: &'static str, value: &Value) -> Result<String, ParseError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ParseError::InvalidField {
            field,
            reason: format!("expected a string, found {value}"),
        })
}

/// Epoch seconds, possibly fractional, kept to microsecond precision.
fn parse_timestamp(value: &Value) -> Result<Timestamp, ParseError> {
    let invalid = |reason: String| ParseError::InvalidField {
        field: TIMESTAMP,
        reason,
    };

    if let Some(seconds) = value.as_i64() {
        return Timestamp::from_second(seconds).map_err(|e| invalid(e.to_string()));
    }

    let seconds = value
        .as_f64()
        .filter(|s| s.is_finite())
        .ok_or_else(|| invalid(format!("expected epoch seconds, found {value}")))?;

    #[allow(clippy::cast_possible_truncation)]
    let micros = (seconds * 1_000_000.0).round() as i64;
    Timestamp::from_microsecond(micros).map_err(|e| invalid(e.to_string()))
}

fn encode_timestamp(timestamp: Timestamp) -> Value {
    let micros = timestamp.as_microsecond();
    if micros % MICROS_PER_SECOND == 0 {
        Value::from(micros / MICROS_PER_SECOND)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let seconds = micros as f64 / 1_000_000.0;
        Value::from(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::model::testing::message;

    fn record(value: Value) -> Record {
        let Value::Object(record) = value else {
            panic!("test records must be JSON objects");
        };
        record
    }

    #[test]
    fn task_uuid() {
        let msg = message(json!({"task_uuid": "cdeb220d-7605-4d5f-8341-1a170222e308"}));
        assert_eq!(msg.task_uuid(), Some("cdeb220d-7605-4d5f-8341-1a170222e308"));
    }

    #[test]
    fn task_level() {
        let msg = message(json!({"task_level": [1]}));
        assert_eq!(msg.task_level().map(TaskLevel::as_slice), Some(&[1][..]));
    }

    #[test]
    fn integer_timestamp() {
        let msg = message(json!({"timestamp": 1_425_356_800}));
        assert_eq!(
            msg.timestamp(),
            Some(Timestamp::from_second(1_425_356_800).unwrap())
        );
    }

    #[test]
    fn fractional_timestamp() {
        let msg = message(json!({"timestamp": 1_425_356_800.25}));
        assert_eq!(
            msg.timestamp(),
            Some(Timestamp::new(1_425_356_800, 250_000_000).unwrap())
        );
    }

    #[test]
    fn other_fields() {
        let msg = message(json!({"foo": "bar", "baz": "qux"}));
        assert_eq!(msg.fields(), &record(json!({"foo": "bar", "baz": "qux"})));
        assert_eq!(msg.kind(), MessageKind::Message);
        assert_eq!(msg.entry_type(), None);
    }

    #[test]
    fn structural_keys_are_stripped_but_status_kept() {
        let msg = message(json!({
            "task_uuid": "t",
            "task_level": [1],
            "timestamp": 0,
            "action_type": "trial:test",
            "action_status": "started",
            "test": "pkg.tests.TestFoo.test_bar",
        }));
        assert_eq!(
            msg.fields(),
            &record(json!({
                "action_status": "started",
                "test": "pkg.tests.TestFoo.test_bar",
            }))
        );
    }

    #[test]
    fn as_dict() {
        let data = record(json!({
            "task_uuid": "t",
            "task_level": [1],
            "timestamp": 1_425_356_800.5,
            "message_type": "trial:test:skip",
            "foo": "bar",
            "baz": "qux",
        }));
        let msg = Message::new(&data).unwrap();
        let expected_timestamp = encode_timestamp(msg.timestamp().unwrap());

        let mut expected = data.clone();
        expected.insert(TIMESTAMP.to_string(), expected_timestamp);
        assert_eq!(msg.as_dict(), expected);
    }

    #[test]
    fn as_dict_for_action_entries() {
        let data = record(json!({
            "task_uuid": "t",
            "task_level": [3],
            "timestamp": 1_425_356_900,
            "action_type": "trial:test",
            "action_status": "failed",
        }));
        assert_eq!(Message::new(&data).unwrap().as_dict(), data);
    }

    #[test]
    fn as_dict_keeps_null_structural_keys() {
        let cases = [
            json!({"task_uuid": null, "task_level": [1], "message_type": "m"}),
            json!({"task_uuid": "t", "task_level": [2], "message_type": null, "x": 1}),
            json!({"task_uuid": "t", "task_level": null, "timestamp": null}),
            json!({"task_uuid": "t", "action_type": "a", "action_status": "started",
                   "timestamp": null}),
        ];
        for case in cases {
            let data = record(case);
            assert_eq!(Message::new(&data).unwrap().as_dict(), data);
        }
    }

    #[test]
    fn null_structural_keys_are_absent() {
        let msg = message(json!({
            "task_uuid": null,
            "task_level": null,
            "timestamp": null,
            "message_type": null,
        }));
        assert_eq!(msg.task_uuid(), None);
        assert_eq!(msg.task_level(), None);
        assert_eq!(msg.timestamp(), None);
        assert_eq!(msg.entry_type(), None);
        assert_eq!(msg.fields().len(), 4);
    }

    #[test]
    fn new_leaves_record_untouched() {
        let data = record(json!({"task_uuid": "t", "message_type": "m", "x": 1}));
        let before = data.clone();
        let _ = Message::new(&data).unwrap();
        assert_eq!(data, before);
    }

    #[test]
    fn classify_start() {
        let data = record(json!({"action_type": "omelette", "action_status": "started"}));
        let (kind, entry_type) = classify(&data).unwrap();
        assert_eq!(kind, MessageKind::ActionStart);
        assert_eq!(entry_type.as_deref(), Some("omelette"));
    }

    #[test]
    fn classify_ends() {
        for (status, expected) in [("succeeded", Status::Succeeded), ("failed", Status::Failed)] {
            let data = record(json!({"action_type": "omelette", "action_status": status}));
            let (kind, _) = classify(&data).unwrap();
            assert_eq!(kind, MessageKind::ActionEnd(expected));
        }
    }

    #[test]
    fn classify_plain_message() {
        let data = record(json!({"message_type": "trial:test:skip", "reason": "foo"}));
        let (kind, entry_type) = classify(&data).unwrap();
        assert_eq!(kind, MessageKind::Message);
        assert_eq!(entry_type.as_deref(), Some("trial:test:skip"));
    }

    #[test]
    fn both_type_tags_are_ambiguous() {
        let cases = [
            json!({"action_type": "a", "message_type": "m", "action_status": "started"}),
            json!({"action_type": "a", "message_type": "m"}),
            json!({"action_type": "a", "message_type": "m", "action_status": "failed"}),
        ];
        for case in cases {
            let err = classify(&record(case)).unwrap_err();
            assert!(matches!(err, ParseError::AmbiguousKind { .. }));
        }
    }

    #[test]
    fn null_type_tag_does_not_conflict() {
        let data = record(json!({"action_type": "a", "message_type": null, "action_status": "started"}));
        let (kind, entry_type) = classify(&data).unwrap();
        assert_eq!(kind, MessageKind::ActionStart);
        assert_eq!(entry_type.as_deref(), Some("a"));

        let data = record(json!({"action_type": null, "message_type": "m"}));
        assert_eq!(classify(&data).unwrap().0, MessageKind::Message);
    }

    #[test]
    fn unrecognized_status_is_ambiguous() {
        for status in [json!("paused"), json!(null), json!(1)] {
            let data = record(json!({"action_type": "a", "action_status": status}));
            let err = Message::new(&data).unwrap_err();
            assert!(matches!(err, ParseError::AmbiguousKind { .. }));
        }
    }

    #[test]
    fn missing_status_is_ambiguous() {
        let err = Message::new(&record(json!({"action_type": "a"}))).unwrap_err();
        assert!(matches!(err, ParseError::AmbiguousKind { .. }));
    }

    #[test]
    fn malformed_structural_fields_are_rejected() {
        let cases = [
            (json!({"task_uuid": 42}), TASK_UUID),
            (json!({"task_level": "1/2"}), TASK_LEVEL),
            (json!({"timestamp": "yesterday"}), TIMESTAMP),
            (json!({"message_type": ["m"]}), MESSAGE_TYPE),
        ];
        for (data, expected) in cases {
            let err = Message::new(&record(data)).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidField { field, .. } if field == expected),
                "expected invalid {expected}, got {err:?}"
            );
        }
    }

    #[test]
    fn status_follows_kind() {
        assert_eq!(message(json!({"message_type": "m"})).status(), None);
        assert_eq!(
            message(json!({"action_type": "a", "action_status": "started"})).status(),
            Some(Status::Started)
        );
        assert_eq!(
            message(json!({"action_type": "a", "action_status": "failed"})).status(),
            Some(Status::Failed)
        );
    }

    #[test]
    fn display_names_type_task_and_level() {
        let msg = message(json!({"task_uuid": "t", "task_level": [1, 2], "message_type": "m"}));
        assert_eq!(msg.to_string(), "m (t/1/2)");
    }
}
