//! Error types for the logging engine
//!
//! Nothing here ever escapes a logging call. Each failure is turned into a
//! [`Diagnostic`], which the logger writes as its own line ahead of the line
//! that triggered it.

use crate::event::LogEvent;
use plumb_interfaces::LogLevel;
use serde_json::{Map, Value as JsonValue};
use std::error::Error as StdError;
use thiserror::Error;

/// Prefix carried by every line the logger writes about itself
pub const LOGGER_PREFIX: &str = "Exception(Logger):";

/// Failures that can occur while building a log line
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoggerError {
    /// A caller object or environment lacks what a provider needs
    #[error("{subject} doesn't conform to {interface}. Context not set. ({reason})")]
    EnrichmentShape {
        subject: String,
        interface: &'static str,
        reason: String,
    },

    /// A data source a provider depends on is not there
    #[error("{0}")]
    EnrichmentUnavailable(String),

    /// A field value could not be turned into JSON
    #[error("Failed to normalise field '{key}': {reason}")]
    Normalization { key: String, reason: String },

    /// The template could not be filled in
    #[error("Failed to interpolate template: {0}")]
    Interpolation(String),

    /// An unrecognized level or output format
    #[error("Invalid {setting} '{value}', using {fallback}")]
    Configuration {
        setting: &'static str,
        value: String,
        fallback: String,
    },
}

/// Configuration loading errors
///
/// Only raised by the explicit config loaders, never by a logging call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading configuration file
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

/// A logger-internal failure waiting to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: LogLevel,
    pub message: String,
    pub error: Option<LoggerError>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, error: LoggerError) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            error: Some(error),
        }
    }

    pub fn warning(message: impl Into<String>, error: Option<LoggerError>) -> Self {
        Self {
            level: LogLevel::Warning,
            message: message.into(),
            error,
        }
    }

    /// Build the line for this diagnostic on top of the given context fields
    pub fn to_event(&self, context: Map<String, JsonValue>) -> LogEvent {
        let event = LogEvent::new(self.level, self.message.clone()).with_fields(context);
        match &self.error {
            Some(error) => event.with_exception(error.to_string()),
            None => event,
        }
    }
}

/// Render an error and every `source()` below it, one cause per line
pub fn render_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str("\nCaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
