//! # Plumb Interfaces
//!
//! The logging contract shared by everything that writes through plumb.
//!
//! Services that only need somewhere to send log lines (storage wrappers,
//! API clients, metric writers) depend on this crate alone. They see a
//! [`StructuredLogger`] and never the context store or enrichers that sit
//! behind the concrete logger in `plumb-logging`.
//!
//! ## Main Interfaces
//!
//! - [`StructuredLogger`] - leveled logging sink with keyword fields
//! - [`Fields`] - keyword values attached to a single log call
//! - [`LogLevel`] - the four severities a call can carry

pub mod logging;

pub use logging::{FieldValue, Fields, LogLevel, LogLevelParseError, NullLogger, StructuredLogger};
