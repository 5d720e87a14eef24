//! Logging interface definitions
//!
//! Provides the structured logging contract that the concrete logger
//! implements and that collaborators log through.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use std::str::FromStr;
use std::sync::Arc;

/// Log level enumeration
///
/// Ordered from most verbose (Debug) to least verbose (Error).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug information useful during development
    Debug,
    /// Informational messages about normal operation
    Info,
    /// Warning messages about potential issues
    #[serde(alias = "warn")]
    Warning,
    /// Error messages about failures
    Error,
}

impl LogLevel {
    /// String written to the `level` field of an emitted line
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    /// Map a numeric threshold onto a level.
    ///
    /// Uses the conventional 10/20/30/40 spacing: anything up to 10 is debug,
    /// up to 20 info, up to 30 warning and up to 50 error. Values outside
    /// `0..=50` are rejected.
    pub fn from_numeric(value: i64) -> Result<Self, LogLevelParseError> {
        match value {
            0..=10 => Ok(LogLevel::Debug),
            11..=20 => Ok(LogLevel::Info),
            21..=30 => Ok(LogLevel::Warning),
            31..=50 => Ok(LogLevel::Error),
            _ => Err(LogLevelParseError(value.to_string())),
        }
    }

    /// Check if this level should be logged given a minimum level
    pub fn should_log(&self, min_level: LogLevel) -> bool {
        self >= &min_level
    }
}

impl FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => match trimmed.parse::<i64>() {
                Ok(numeric) => LogLevel::from_numeric(numeric),
                Err(_) => Err(LogLevelParseError(s.to_string())),
            },
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing log level from string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid log level: '{0}'")]
pub struct LogLevelParseError(pub String);

/// A single keyword value captured for a log call.
///
/// Values are converted to JSON when they are captured. A value whose
/// `Serialize` implementation fails is kept as `Unserializable` so the
/// logger can report it at emission time instead of the caller seeing an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(JsonValue),
    Unserializable(String),
}

impl FieldValue {
    pub fn capture(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => FieldValue::Value(json),
            Err(e) => FieldValue::Unserializable(e.to_string()),
        }
    }
}

/// Keyword fields attached to one log call.
///
/// Keys are unique; inserting an existing key replaces its value in place,
/// keeping the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.insert_captured(key.into(), FieldValue::capture(value));
    }

    pub fn insert_captured(&mut self, key: String, value: FieldValue) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert_captured(key.into(), FieldValue::Value(value));
        }
        fields
    }
}

impl From<serde_json::Map<String, JsonValue>> for Fields {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        map.into_iter().collect()
    }
}

/// Build [`Fields`] from `key = value` pairs.
///
/// ```
/// use plumb_interfaces::fields;
///
/// let fields = fields!(user_id = 42, email = "a@b.c");
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:ident = $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(stringify!($key), &$value);
        )+
        fields
    }};
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert($key, &$value);
        )+
        fields
    }};
}

/// Structured logger trait
///
/// The only thing collaborators may rely on. Implementations never return
/// errors and never panic; a failure inside the logger is reported as an
/// extra log line instead.
pub trait StructuredLogger: Send + Sync {
    /// Log a templated message with keyword fields
    fn log(&self, level: LogLevel, template: &str, fields: Fields);

    /// Log at error level, embedding `error` and its source chain
    fn log_exception(&self, template: &str, error: &(dyn StdError + 'static), fields: Fields);

    /// Check if a log level would be written
    fn is_enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn debug(&self, template: &str, fields: Fields) {
        self.log(LogLevel::Debug, template, fields);
    }

    fn info(&self, template: &str, fields: Fields) {
        self.log(LogLevel::Info, template, fields);
    }

    fn warning(&self, template: &str, fields: Fields) {
        self.log(LogLevel::Warning, template, fields);
    }

    fn error(&self, template: &str, fields: Fields) {
        self.log(LogLevel::Error, template, fields);
    }

    fn exception(&self, template: &str, error: &(dyn StdError + 'static), fields: Fields) {
        self.log_exception(template, error, fields);
    }
}

impl<T: StructuredLogger + ?Sized> StructuredLogger for Arc<T> {
    fn log(&self, level: LogLevel, template: &str, fields: Fields) {
        (**self).log(level, template, fields);
    }

    fn log_exception(&self, template: &str, error: &(dyn StdError + 'static), fields: Fields) {
        (**self).log_exception(template, error, fields);
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        (**self).is_enabled(level)
    }
}

impl<T: StructuredLogger + ?Sized> StructuredLogger for &T {
    fn log(&self, level: LogLevel, template: &str, fields: Fields) {
        (**self).log(level, template, fields);
    }

    fn log_exception(&self, template: &str, error: &(dyn StdError + 'static), fields: Fields) {
        (**self).log_exception(template, error, fields);
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        (**self).is_enabled(level)
    }
}

/// Logger that discards everything.
///
/// Handy default for collaborators constructed without a sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl StructuredLogger for NullLogger {
    fn log(&self, _level: LogLevel, _template: &str, _fields: Fields) {}

    fn log_exception(&self, _template: &str, _error: &(dyn StdError + 'static), _fields: Fields) {}

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}
