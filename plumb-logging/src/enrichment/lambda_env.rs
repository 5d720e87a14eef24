//! Serverless function runtime environment

use super::{EnrichmentBlock, Enricher};
use crate::error::LoggerError;
use serde::Deserialize;
use serde_json::{json, Map};
use std::sync::Mutex;

pub const BLOCK_NAME: &str = "lambda_os";

pub const REGION_VAR: &str = "AWS_DEFAULT_REGION";
pub const FUNCTION_NAME_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Variables the function runtime sets for every invocation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LambdaEnvironment {
    pub aws_default_region: String,
    pub aws_lambda_function_name: String,
}

impl LambdaEnvironment {
    /// Read from the process environment; every variable must be non-empty
    pub fn from_env() -> Result<Self, LoggerError> {
        tracing::debug!("Loading serverless environment settings");
        let missing: Vec<&str> = [REGION_VAR, FUNCTION_NAME_VAR]
            .into_iter()
            .filter(|var| std::env::var(var).map(|v| v.is_empty()).unwrap_or(true))
            .collect();
        if !missing.is_empty() {
            return Err(LoggerError::EnrichmentShape {
                subject: "Environment".to_string(),
                interface: "LambdaEnvironment",
                reason: format!("missing: {}", missing.join(", ")),
            });
        }

        envy::from_env::<Self>().map_err(|e| LoggerError::EnrichmentShape {
            subject: "Environment".to_string(),
            interface: "LambdaEnvironment",
            reason: e.to_string(),
        })
    }
}

/// Lazily loaded value that can be dropped and reloaded.
///
/// A failed load is not cached; the next call tries again.
#[derive(Debug)]
pub struct SettingsCache<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for SettingsCache<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> SettingsCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_try_load<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut guard = self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = load()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    pub fn invalidate(&self) {
        let mut guard = self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.value
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }
}

pub struct LambdaEnvironmentEnricher<'a> {
    cache: &'a SettingsCache<LambdaEnvironment>,
}

impl<'a> LambdaEnvironmentEnricher<'a> {
    pub fn new(cache: &'a SettingsCache<LambdaEnvironment>) -> Self {
        Self { cache }
    }
}

impl Enricher for LambdaEnvironmentEnricher<'_> {
    fn source_name(&self) -> &'static str {
        "Lambda environment"
    }

    fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
        let environment = self.cache.get_or_try_load(LambdaEnvironment::from_env)?;

        let mut fields = Map::new();
        fields.insert(
            "function_name".to_string(),
            json!(environment.aws_lambda_function_name),
        );
        fields.insert("aws_region".to_string(), json!(environment.aws_default_region));

        Ok(EnrichmentBlock::new(BLOCK_NAME, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_function_and_region() {
        let vars = [
            (REGION_VAR, Some("eu-west-2")),
            (FUNCTION_NAME_VAR, Some("test-function")),
        ];

        temp_env::with_vars(vars, || {
            let cache = SettingsCache::new();
            let block = LambdaEnvironmentEnricher::new(&cache).extract().unwrap();

            assert_eq!(block.name(), "lambda_os");
            assert_eq!(block.fields()["function_name"], "test-function");
            assert_eq!(block.fields()["aws_region"], "eu-west-2");
            assert!(cache.is_loaded());
        });
    }

    #[test]
    fn test_missing_variables_are_named() {
        let vars = [(REGION_VAR, Some("")), (FUNCTION_NAME_VAR, None::<&str>)];

        temp_env::with_vars(vars, || {
            let cache = SettingsCache::new();
            let err = LambdaEnvironmentEnricher::new(&cache).extract().unwrap_err();

            let rendered = err.to_string();
            assert!(rendered.contains(REGION_VAR));
            assert!(rendered.contains(FUNCTION_NAME_VAR));
            assert!(!cache.is_loaded());
        });
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let cache = SettingsCache::new();

        let first: Result<u32, ()> = cache.get_or_try_load(|| Ok(1));
        let second: Result<u32, ()> = cache.get_or_try_load(|| Ok(2));
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));

        cache.invalidate();
        let third: Result<u32, ()> = cache.get_or_try_load(|| Ok(3));
        assert_eq!(third, Ok(3));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cache: SettingsCache<u32> = SettingsCache::new();

        assert_eq!(cache.get_or_try_load(|| Err("down")), Err("down"));
        assert!(!cache.is_loaded());
        assert_eq!(cache.get_or_try_load(|| Ok::<_, &str>(7)), Ok(7));
    }
}
