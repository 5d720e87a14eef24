#![allow(dead_code)]

use plumb_logging::{Logger, LoggerBuilder, LoggerConfig, MemoryWriter};
use serde_json::Value as JsonValue;

pub const APP_NAME: &str = "logging-integration-tests";
pub const ENVIRONMENT: &str = "TEST";

/// Build a logger whose output lands in a shared buffer
pub fn capture(config: LoggerConfig) -> (Logger, MemoryWriter) {
    capture_with(Logger::builder(config))
}

pub fn capture_with(builder: LoggerBuilder) -> (Logger, MemoryWriter) {
    let output = MemoryWriter::new();
    let logger = builder.writer(output.clone()).build();
    (logger, output)
}

/// Build under a known `APP_NAME` / `ENVIRONMENT`
pub fn capture_in_test_env(config: LoggerConfig) -> (Logger, MemoryWriter) {
    temp_env::with_vars(
        [("APP_NAME", Some(APP_NAME)), ("ENVIRONMENT", Some(ENVIRONMENT))],
        || capture(config),
    )
}

pub fn debug_config() -> LoggerConfig {
    LoggerConfig::new().with_level("debug")
}

/// The only line written, parsed
pub fn single_line(output: &MemoryWriter) -> JsonValue {
    let lines = output.json_lines();
    assert_eq!(lines.len(), 1, "expected one line, got {:?}", output.lines());
    lines.into_iter().next().unwrap()
}
