//! Envelope Data Model
//!
//! The unit every connection reads and writes: a type tag, an optional
//! timestamp and an opaque JSON payload.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::ProcessorError;

/// Reserved type tag for error responses
pub const ERROR_TYPE: &str = "error";

/// Payload of the error sent back for an unregistered type
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown message type";

/// A single message exchanged with a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind, used for processor lookup; empty when the frame has none
    #[serde(rename = "type", default)]
    pub kind: String,

    /// When the message was produced; `None` until stamped
    #[serde(default, deserialize_with = "deserialize_time")]
    pub time: Option<DateTime<Utc>>,

    /// Opaque payload, interpreted only by processors
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Create an unstamped envelope
    pub fn new(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            time: None,
            payload: payload.into(),
        }
    }

    /// Create an `"error"` envelope with a human-readable message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR_TYPE, Value::String(message.into()))
    }

    /// Set an explicit timestamp
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Stamp with the current time unless a timestamp is already present
    pub fn stamp(&mut self) {
        if self.time.is_none() {
            self.time = Some(Utc::now());
        }
    }

    /// By-value form of [`Envelope::stamp`]
    pub fn stamped(mut self) -> Self {
        self.stamp();
        self
    }

    /// Whether this envelope carries the reserved error tag
    pub fn is_error(&self) -> bool {
        self.kind == ERROR_TYPE
    }

    /// Decode the payload into a concrete type
    ///
    /// Processors use this to validate payload shape; a mismatch becomes a
    /// [`ProcessorError`] that the hub reports back to the sender.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProcessorError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            ProcessorError::new(format!("invalid payload for '{}': {}", self.kind, e))
        })
    }
}

/// Missing, `null` and the zero timestamp (`0001-01-01T00:00:00Z`) all decode as unset.
fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let time = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single();
    Ok(time.filter(|t| Some(*t) != zero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_new_is_unstamped() {
        let env = Envelope::new("echo", "hi");
        assert_eq!(env.kind, "echo");
        assert!(env.time.is_none());
        assert_eq!(env.payload, json!("hi"));
    }

    #[test]
    fn test_stamp_sets_now() {
        let mut env = Envelope::new("echo", Value::Null);
        env.stamp();

        let time = env.time.unwrap();
        assert!(Utc::now() - time < Duration::seconds(5));
    }

    #[test]
    fn test_stamp_keeps_existing_time() {
        let fixed = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let env = Envelope::new("echo", Value::Null).with_time(fixed).stamped();
        assert_eq!(env.time, Some(fixed));
    }

    #[test]
    fn test_error_envelope() {
        let env = Envelope::error("forced error");
        assert!(env.is_error());
        assert_eq!(env.payload, json!("forced error"));
    }

    #[test]
    fn test_wire_shape() {
        let fixed = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let env = Envelope::new("hello", json!({"name": "don"})).with_time(fixed);

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "hello");
        assert_eq!(value["time"], "2020-01-02T03:04:05Z");
        assert_eq!(value["payload"]["name"], "don");
    }

    #[test]
    fn test_deserialize_without_time_or_payload() {
        let env: Envelope = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(env.kind, "ping");
        assert!(env.time.is_none());
        assert_eq!(env.payload, Value::Null);
    }

    #[test]
    fn test_zero_time_is_unset() {
        let json = r#"{"type": "ping", "time": "0001-01-01T00:00:00Z", "payload": null}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        assert!(env.time.is_none());

        let json = r#"{"type": "ping", "time": null}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        assert!(env.time.is_none());
    }

    #[test]
    fn test_other_year_one_times_are_kept() {
        let json = r#"{"type": "x", "time": "0001-06-01T12:00:00Z"}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();

        let expected = Utc.with_ymd_and_hms(1, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(env.time, Some(expected));
    }

    #[test]
    fn test_missing_type_decodes_empty() {
        let env: Envelope = serde_json::from_str(r#"{"payload": 1}"#).unwrap();
        assert_eq!(env.kind, "");
        assert_eq!(env.payload, json!(1));
    }

    #[test]
    fn test_payload_as() {
        #[derive(Debug, Deserialize)]
        struct Greeting {
            name: String,
        }

        let env = Envelope::new("hello", json!({"name": "don"}));
        let greeting: Greeting = env.payload_as().unwrap();
        assert_eq!(greeting.name, "don");

        let bad = Envelope::new("hello", json!(42));
        let err = bad.payload_as::<Greeting>().unwrap_err();
        assert!(err.to_string().contains("invalid payload for 'hello'"));
    }
}
