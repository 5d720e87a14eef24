//! Context-aware structured logging
//!
//! This crate provides:
//! - One JSON (or text) line per call, with `{name}` message templates
//! - A rolling context with a correlation id, refreshed per unit of work
//! - Enrichment from container metadata, serverless runtimes, invocation
//!   contexts and web requests
//! - Failures inside the logger reported as extra lines, never raised

pub mod config;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod event;
pub mod init;
pub mod logger;
pub mod sinks;
pub mod template;

// Re-export main types for convenience
pub use config::{ExecutionEnvironment, LevelSetting, LogFormat, LoggerConfig, ResolvedConfig, Truthy};
pub use context::{BaseContext, ContextSnapshot, ContextStore};
pub use enrichment::{
    ContextEnrichment, Enricher, EnrichmentBlock, HeaderLookup, HttpMetadataClient, InvocationContext,
    LambdaEnvironment, LambdaInvocation, MetadataClient, SettingsCache, WebRequest,
};
pub use error::{ConfigError, Diagnostic, LoggerError};
pub use event::LogEvent;
pub use init::init_internal_tracing;
pub use logger::{Logger, LoggerBuilder};
pub use sinks::{ConsoleSink, LogSink, MemoryWriter};

pub use plumb_interfaces::{fields, FieldValue, Fields, LogLevel, NullLogger, StructuredLogger};

use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_LOGGER: OnceCell<Arc<dyn StructuredLogger>> = OnceCell::new();

/// Initialize the global logger
pub fn init_logger(logger: Arc<dyn StructuredLogger>) -> Result<(), &'static str> {
    GLOBAL_LOGGER.set(logger).map_err(|_| "Logger already initialized")
}

/// Get the global logger
pub fn logger() -> Option<Arc<dyn StructuredLogger>> {
    GLOBAL_LOGGER.get().cloned()
}

/// Log a structured event through the global logger
///
/// ```
/// use plumb_logging::{log_event, LogLevel};
///
/// log_event!(LogLevel::Info, "job {job_id} finished", job_id = 42);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $template:expr) => {
        if let Some(logger) = $crate::logger() {
            $crate::StructuredLogger::log(&logger, $level, $template, $crate::Fields::new());
        }
    };
    ($level:expr, $template:expr, $($key:ident = $value:expr),+ $(,)?) => {
        if let Some(logger) = $crate::logger() {
            $crate::StructuredLogger::log(&logger, $level, $template, $crate::fields!($($key = $value),+));
        }
    };
}

/// Log an error and its source chain through the global logger
#[macro_export]
macro_rules! log_exception {
    ($error:expr, $template:expr) => {
        if let Some(logger) = $crate::logger() {
            $crate::StructuredLogger::log_exception(&logger, $template, &$error, $crate::Fields::new());
        }
    };
    ($error:expr, $template:expr, $($key:ident = $value:expr),+ $(,)?) => {
        if let Some(logger) = $crate::logger() {
            $crate::StructuredLogger::log_exception(
                &logger,
                $template,
                &$error,
                $crate::fields!($($key = $value),+),
            );
        }
    };
}
