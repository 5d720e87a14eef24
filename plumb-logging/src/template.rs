//! Message templating
//!
//! A call supplies a template such as `"user {id} logged in"` and keyword
//! fields. Fields are normalized first (nested values become canonical JSON
//! strings), then `{name}` placeholders are filled from the normalized
//! values. Either step can fail; [`render`] always produces a message and
//! hands any failure back as a [`Diagnostic`].
//!
//! Placeholder values are written the way JSON writes them: booleans as
//! `true`/`false` and null as `null`. Strings are inserted without quotes.

use crate::error::{Diagnostic, LoggerError, LOGGER_PREFIX};
use plumb_interfaces::{FieldValue, Fields};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value as JsonValue};
use std::io;

pub fn normalisation_failed_message() -> String {
    format!("{LOGGER_PREFIX} Failed to normalise kwargs")
}

pub fn interpolation_failed_message() -> String {
    format!(
        "{LOGGER_PREFIX} Variable interpolation failed when formatting log message. Is a value missing?"
    )
}

/// Result of rendering one call's template and fields
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub message: String,
    pub fields: Map<String, JsonValue>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalize `fields` and fill `template` from them.
///
/// - normalization failure: message is the raw template, no fields
/// - interpolation failure: message is the raw template, fields kept
pub fn render(template: &str, fields: &Fields) -> RenderedMessage {
    let normalized = match normalize_fields(fields) {
        Ok(normalized) => normalized,
        Err(err) => {
            return RenderedMessage {
                message: template.to_string(),
                fields: Map::new(),
                diagnostics: vec![Diagnostic::error(normalisation_failed_message(), err)],
            }
        }
    };

    match interpolate(template, &normalized) {
        Ok(message) => RenderedMessage {
            message,
            fields: normalized,
            diagnostics: Vec::new(),
        },
        Err(err) => RenderedMessage {
            message: template.to_string(),
            fields: normalized,
            diagnostics: vec![Diagnostic::error(interpolation_failed_message(), err)],
        },
    }
}

/// Normalize every field; a single bad value fails the whole set
pub fn normalize_fields(fields: &Fields) -> Result<Map<String, JsonValue>, LoggerError> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.to_string(), normalize_value(key, value)?)))
        .collect()
}

/// Primitives pass through, lists and objects become canonical JSON text
pub fn normalize_value(key: &str, value: &FieldValue) -> Result<JsonValue, LoggerError> {
    match value {
        FieldValue::Unserializable(reason) => Err(LoggerError::Normalization {
            key: key.to_string(),
            reason: reason.clone(),
        }),
        FieldValue::Value(json @ (JsonValue::Array(_) | JsonValue::Object(_))) => canonical_json(json)
            .map(JsonValue::String)
            .map_err(|e| LoggerError::Normalization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        FieldValue::Value(json) => Ok(json.clone()),
    }
}

/// Serialize with sorted keys and `", "` / `": "` separators
pub fn canonical_json(value: &JsonValue) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, SpacedFormatter);
    sort_keys(value).serialize(&mut serializer)?;
    // serde_json only ever writes UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn sort_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<(&String, &JsonValue)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Fill `{name}` placeholders from `values`.
///
/// `{{` and `}}` produce literal braces. Placeholders must name a key;
/// empty `{}` and unbalanced braces are errors.
pub fn interpolate(template: &str, values: &Map<String, JsonValue>) -> Result<String, LoggerError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            output.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            output.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(LoggerError::Interpolation(
                "single '}' encountered in template".to_string(),
            ));
        } else {
            let close = tail.find('}').ok_or_else(|| {
                LoggerError::Interpolation("unclosed '{' in template".to_string())
            })?;
            let name = &tail[1..close];
            if name.is_empty() {
                return Err(LoggerError::Interpolation(
                    "positional placeholder '{}' has no name".to_string(),
                ));
            }
            if name.contains('{') {
                return Err(LoggerError::Interpolation(format!(
                    "unexpected '{{' inside placeholder '{name}'"
                )));
            }
            let value = values.get(name).ok_or_else(|| {
                LoggerError::Interpolation(format!("no value for placeholder '{name}'"))
            })?;
            push_value(&mut output, value);
            rest = &tail[close + 1..];
        }
    }

    output.push_str(rest);
    Ok(output)
}

fn push_value(output: &mut String, value: &JsonValue) {
    match value {
        JsonValue::String(s) => output.push_str(s),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            output.push_str(&canonical_json(value).unwrap_or_else(|_| value.to_string()))
        }
        other => output.push_str(&other.to_string()),
    }
}
