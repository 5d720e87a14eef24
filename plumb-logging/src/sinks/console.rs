use super::LogSink;
use crate::config::LogFormat;
use crate::event::{LogEvent, RESERVED_KEYS};
use colored::Colorize;
use plumb_interfaces::LogLevel;
use serde_json::Value as JsonValue;
use std::io::{IsTerminal, Write};
use std::sync::Mutex;

/// Line-per-event writer for JSON or human-readable output
pub struct ConsoleSink {
    format: LogFormat,
    colorize: bool,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Write to standard output, colouring text levels only on a terminal
    pub fn stdout(format: LogFormat) -> Self {
        Self {
            format,
            colorize: std::io::stdout().is_terminal(),
            writer: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    pub fn new(format: LogFormat, writer: impl Write + Send + 'static) -> Self {
        Self {
            format,
            colorize: false,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn with_colors(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn format_event(&self, event: &LogEvent) -> String {
        match self.format {
            // JSON format for production
            LogFormat::Json => serde_json::to_string(&event.to_record())
                .unwrap_or_else(|_| event.message.clone()),
            // Human-readable format for development
            LogFormat::Text => self.format_text(event),
        }
    }

    fn format_text(&self, event: &LogEvent) -> String {
        let label = format!("{:<7}", event.level.as_str().to_uppercase());
        let level_str = if self.colorize {
            match event.level {
                LogLevel::Debug => label.blue().to_string(),
                LogLevel::Info => label.green().to_string(),
                LogLevel::Warning => label.yellow().to_string(),
                LogLevel::Error => label.red().to_string(),
            }
        } else {
            label
        };

        let mut output = format!(
            "{} [{}] {}",
            event.formatted_timestamp(),
            level_str,
            single_line(&event.message)
        );

        for (key, value) in event
            .fields
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        {
            output.push_str(&format!(" {}={}", key, text_value(value)));
        }

        if let Some(exception) = &event.exception {
            output.push_str(&format!(" exception={}", JsonValue::from(exception.as_str())));
        }

        output
    }
}

fn single_line(message: &str) -> String {
    message.replace('\n', "\\n")
}

/// Bare strings stay bare unless they would break `key=value` parsing
fn text_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s)
            if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"' || c == '=') =>
        {
            s.clone()
        }
        other => other.to_string(),
    }
}

impl LogSink for ConsoleSink {
    fn log_all(&self, events: &[LogEvent]) {
        let formatted: Vec<String> = events.iter().map(|event| self.format_event(event)).collect();

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for line in formatted {
            if let Err(e) = writeln!(writer, "{line}") {
                tracing::warn!(error = %e, "Failed to write log line");
                return;
            }
        }
    }

    fn flush(&self) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writer.flush() {
            tracing::warn!(error = %e, "Failed to flush log output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemoryWriter;
    use serde_json::json;

    fn event() -> LogEvent {
        LogEvent::new(LogLevel::Warning, "disk nearly full")
            .with_template("disk nearly full")
            .with_field("mount", json!("/var"))
            .with_field("note", json!("two words"))
            .with_field("percent", json!(93))
    }

    #[test]
    fn test_json_line_is_flat_and_sorted() {
        let sink = ConsoleSink::new(LogFormat::Json, std::io::sink());

        let line = sink.format_event(&event());

        assert!(line.starts_with("{\"level\":\"warning\",\"message\":\"disk nearly full\""));
        let value: JsonValue = serde_json::from_str(&line).unwrap();
        assert_eq!(value["percent"], 93);
    }

    #[test]
    fn test_text_line() {
        let sink = ConsoleSink::new(LogFormat::Text, std::io::sink());
        let event = event().with_exception("boom\nCaused by: io");

        let line = sink.format_event(&event);

        assert!(line.contains(" [WARNING] disk nearly full"));
        assert!(line.contains(" mount=/var"));
        assert!(line.contains(" note=\"two words\""));
        assert!(line.contains(" percent=93"));
        assert!(line.ends_with(" exception=\"boom\\nCaused by: io\""));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_writes_one_line_per_event() {
        let buffer = MemoryWriter::new();
        let sink = ConsoleSink::new(LogFormat::Json, buffer.clone());

        sink.log(&event());
        sink.log(&event());
        sink.flush();

        assert_eq!(buffer.lines().len(), 2);
    }

    #[test]
    fn test_batch_keeps_order() {
        let buffer = MemoryWriter::new();
        let sink = ConsoleSink::new(LogFormat::Json, buffer.clone());

        sink.log_all(&[
            LogEvent::new(LogLevel::Error, "first"),
            LogEvent::new(LogLevel::Info, "second"),
        ]);

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "first");
        assert_eq!(lines[1]["message"], "second");
    }
}
