use chrono::{DateTime, SecondsFormat, Utc};
use plumb_interfaces::LogLevel;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

pub const TIMESTAMP: &str = "timestamp";
pub const LEVEL: &str = "level";
pub const MESSAGE: &str = "message";
pub const MESSAGE_TEMPLATE: &str = "message_template";
pub const EXCEPTION: &str = "exception";

/// Keys owned by the event itself. A field with one of these names is
/// overwritten when the line is rendered.
pub const RESERVED_KEYS: [&str; 5] = [TIMESTAMP, LEVEL, MESSAGE, MESSAGE_TEMPLATE, EXCEPTION];

/// One finished log line, before rendering.
///
/// `fields` holds context and keyword values that have already been
/// normalized, so every value in it is a JSON primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub message_template: Option<String>,
    pub exception: Option<String>,
    pub fields: Map<String, JsonValue>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            message_template: None,
            exception: None,
            fields: Map::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Merge fields in; later calls win on key collisions
    pub fn with_fields(mut self, fields: Map<String, JsonValue>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Flatten into the single-level object written as a JSON line
    pub fn to_record(&self) -> Map<String, JsonValue> {
        let mut record = self.fields.clone();
        record.insert(TIMESTAMP.to_string(), json!(self.formatted_timestamp()));
        record.insert(LEVEL.to_string(), json!(self.level.as_str()));
        record.insert(MESSAGE.to_string(), json!(self.message));
        match &self.message_template {
            Some(template) => record.insert(MESSAGE_TEMPLATE.to_string(), json!(template)),
            None => record.remove(MESSAGE_TEMPLATE),
        };
        match &self.exception {
            Some(exception) => record.insert(EXCEPTION.to_string(), json!(exception)),
            None => record.remove(EXCEPTION),
        };
        record
    }
}

impl Serialize for LogEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_win_over_fields() {
        let event = LogEvent::new(LogLevel::Info, "real message")
            .with_field("message", json!("spoofed"))
            .with_field("level", json!("error"))
            .with_field("user_id", json!(7));

        let record = event.to_record();

        assert_eq!(record["message"], "real message");
        assert_eq!(record["level"], "info");
        assert_eq!(record["user_id"], 7);
    }

    #[test]
    fn test_absent_template_and_exception_are_not_rendered() {
        let record = LogEvent::new(LogLevel::Debug, "plain")
            .with_field("exception", json!("from a field"))
            .to_record();

        assert!(!record.contains_key("message_template"));
        assert!(!record.contains_key("exception"));
    }

    #[test]
    fn test_timestamp_is_utc_with_micros() {
        let event = LogEvent::new(LogLevel::Info, "t");
        let stamp = event.formatted_timestamp();

        assert!(stamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
        // 2024-01-01T00:00:00.000000Z
        assert_eq!(stamp.len(), 27);
    }

    #[test]
    fn test_serializes_as_flat_record() {
        let event = LogEvent::new(LogLevel::Warning, "hi 1")
            .with_template("hi {x}")
            .with_field("x", json!(1));

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["message"], "hi 1");
        assert_eq!(value["message_template"], "hi {x}");
        assert_eq!(value["level"], "warning");
        assert_eq!(value["x"], 1);
    }
}
