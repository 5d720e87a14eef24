//! Rolling context merged into every log line
//!
//! The store keeps two layers. Base fields (`context_id`, `env_app_name`,
//! `env_environment_name`, `ship_logs`) live as long as the logger; dynamic
//! fields come from enrichers and `set_context_field` and are dropped on
//! every refresh.

use crate::enrichment::Enricher;
use crate::error::{Diagnostic, LOGGER_PREFIX};
use crate::template::normalize_value;
use plumb_interfaces::{FieldValue, Fields};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

pub const CONTEXT_ID: &str = "context_id";
pub const ENV_APP_NAME: &str = "env_app_name";
pub const ENV_ENVIRONMENT_NAME: &str = "env_environment_name";
pub const SHIP_LOGS: &str = "ship_logs";

pub const APP_NAME_VAR: &str = "APP_NAME";
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";

const UNKNOWN: &str = "unknown";

/// Fields fixed for the lifetime of a logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseContext {
    pub app_name: String,
    pub environment_name: String,
    pub ship_logs: bool,
}

impl BaseContext {
    /// Read the application and environment names from the process
    pub fn from_env(ship_logs: bool) -> Self {
        Self {
            app_name: env_or_unknown(APP_NAME_VAR),
            environment_name: env_or_unknown(ENVIRONMENT_VAR),
            ship_logs,
        }
    }
}

fn env_or_unknown(var: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Context fields ready to be put on a line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    pub base: Map<String, JsonValue>,
    pub dynamic: Map<String, JsonValue>,
}

impl ContextSnapshot {
    /// Dynamic fields overlaid with base fields
    pub fn merged(&self) -> Map<String, JsonValue> {
        let mut merged = self.dynamic.clone();
        merged.extend(self.base.clone());
        merged
    }
}

#[derive(Debug, Clone)]
pub struct ContextStore {
    base: BaseContext,
    context_id: String,
    dynamic: Fields,
}

impl ContextStore {
    pub fn new(base: BaseContext) -> Self {
        Self {
            base,
            context_id: Self::generate_context_id(),
            dynamic: Fields::new(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn base(&self) -> &BaseContext {
        &self.base
    }

    /// Drop dynamic fields and start a new correlation id
    pub fn reset(&mut self) {
        self.dynamic = Fields::new();
        self.context_id = Self::generate_context_id();
    }

    /// Upsert a dynamic field; normalization waits until emission
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.dynamic.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.dynamic.get(key).is_some()
    }

    /// Run each enricher, merging whole blocks.
    ///
    /// A failing enricher contributes nothing and yields one diagnostic;
    /// the remaining enrichers still run.
    pub fn apply(&mut self, enrichers: &[&dyn Enricher]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for enricher in enrichers {
            match enricher.extract() {
                Ok(block) => {
                    tracing::debug!(block = block.name(), "Merged enrichment block");
                    let (name, fields) = block.into_parts();
                    self.dynamic
                        .insert_captured(name.to_string(), FieldValue::Value(JsonValue::Object(fields)));
                }
                Err(err) => diagnostics.push(Diagnostic::error(
                    format!(
                        "{LOGGER_PREFIX} Failed to extract {} fields",
                        enricher.source_name()
                    ),
                    err,
                )),
            }
        }
        diagnostics
    }

    /// Normalize the current context for emission.
    ///
    /// Dynamic fields that fail to normalize are left out, one diagnostic
    /// each.
    pub fn snapshot(&self) -> (ContextSnapshot, Vec<Diagnostic>) {
        let mut base = Map::new();
        base.insert(CONTEXT_ID.to_string(), json!(self.context_id));
        base.insert(ENV_APP_NAME.to_string(), json!(self.base.app_name));
        base.insert(
            ENV_ENVIRONMENT_NAME.to_string(),
            json!(self.base.environment_name),
        );
        base.insert(SHIP_LOGS.to_string(), json!(u8::from(self.base.ship_logs)));

        let mut dynamic = Map::new();
        let mut diagnostics = Vec::new();
        for (key, value) in self.dynamic.iter() {
            match normalize_value(key, value) {
                Ok(normalized) => {
                    dynamic.insert(key.to_string(), normalized);
                }
                Err(err) => diagnostics.push(Diagnostic::error(
                    format!("{LOGGER_PREFIX} Failed to normalise kwargs for context field '{key}'"),
                    err,
                )),
            }
        }

        (ContextSnapshot { base, dynamic }, diagnostics)
    }

    fn generate_context_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentBlock;
    use crate::error::LoggerError;
    use std::collections::HashMap;

    fn store() -> ContextStore {
        ContextStore::new(BaseContext {
            app_name: "logging-unit-tests".to_string(),
            environment_name: "TEST".to_string(),
            ship_logs: true,
        })
    }

    struct Fixed(&'static str, JsonValue);

    impl Enricher for Fixed {
        fn source_name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
            let fields = self.1.as_object().cloned().unwrap_or_default();
            Ok(EnrichmentBlock::new(self.0, fields))
        }
    }

    struct Broken;

    impl Enricher for Broken {
        fn source_name(&self) -> &'static str {
            "broken source"
        }

        fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
            Err(LoggerError::EnrichmentUnavailable("nothing here".to_string()))
        }
    }

    #[test]
    fn test_base_fields_present() {
        let (snapshot, diagnostics) = store().snapshot();
        let merged = snapshot.merged();

        assert!(diagnostics.is_empty());
        assert_eq!(merged[ENV_APP_NAME], "logging-unit-tests");
        assert_eq!(merged[ENV_ENVIRONMENT_NAME], "TEST");
        assert_eq!(merged[SHIP_LOGS], 1);
        assert!(merged[CONTEXT_ID].as_str().is_some());
    }

    #[test]
    fn test_reset_clears_dynamic_and_rotates_id() {
        let mut store = store();
        let first_id = store.context_id().to_string();
        store.set_field("added_context", "initial_context");

        store.reset();

        assert_ne!(store.context_id(), first_id);
        assert!(!store.contains("added_context"));
        assert_eq!(store.base().app_name, "logging-unit-tests");
    }

    #[test]
    fn test_set_field_twice_keeps_one_entry() {
        let mut store = store();
        store.set_field("k", "v");
        store.set_field("k", "v");

        let (snapshot, _) = store.snapshot();

        assert_eq!(snapshot.dynamic.len(), 1);
        assert_eq!(snapshot.dynamic["k"], "v");
    }

    #[test]
    fn test_base_fields_cannot_be_shadowed() {
        let mut store = store();
        store.set_field(CONTEXT_ID, "hijacked");

        let merged = store.snapshot().0.merged();

        assert_eq!(merged[CONTEXT_ID], store.context_id());
    }

    #[test]
    fn test_nested_fields_normalized_lazily() {
        let mut store = store();
        store.set_field("dictionary", json!({"first_key": {"second_key": "second_value"}}));
        store.set_field("list", json!([["first_entry", "second_entry"]]));

        let (snapshot, _) = store.snapshot();

        assert_eq!(
            snapshot.dynamic["dictionary"],
            "{\"first_key\": {\"second_key\": \"second_value\"}}"
        );
        assert_eq!(snapshot.dynamic["list"], "[[\"first_entry\", \"second_entry\"]]");
    }

    #[test]
    fn test_unserializable_context_field_is_skipped() {
        let mut store = store();
        let mut bad = HashMap::new();
        bad.insert((1, 1), 1);
        store.set_field("foo", bad);
        store.set_field("fine", 1);

        let (snapshot, diagnostics) = store.snapshot();

        assert!(!snapshot.dynamic.contains_key("foo"));
        assert_eq!(snapshot.dynamic["fine"], 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("Failed to normalise kwargs"));
    }

    #[test]
    fn test_failing_enricher_does_not_stop_others() {
        let mut store = store();
        let good = Fixed("request", json!({"method": "GET"}));

        let diagnostics = store.apply(&[&Broken, &good]);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Exception(Logger): Failed to extract broken source fields"
        );
        assert!(store.contains("request"));
    }
}
