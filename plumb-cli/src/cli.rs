//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use plumb_logging::LogLevel;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML logger configuration (defaults to PLUMB_* environment variables)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Filter for the tool's own diagnostics on stderr (overridden by PLUMB_INTERNAL_LOG)
    #[arg(long, value_name = "FILTER", default_value = "warn", global = true)]
    pub internal_log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write one structured log line to stdout
    Log(LogArgs),
}

#[derive(clap::Args, Debug)]
pub struct LogArgs {
    /// Level of this line: debug, info, warning or error
    #[arg(value_parser = parse_level)]
    pub level: LogLevel,

    /// Message template, e.g. "user {user_id} signed in"
    pub template: String,

    /// Fields as key=value; values that parse as JSON are kept as JSON
    #[arg(value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, JsonValue)>,

    /// Output format (json or text), overriding the configuration
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Minimum level written, by name or number, overriding the configuration
    #[arg(long, value_name = "LEVEL")]
    pub level_threshold: Option<String>,

    /// Invocation request id to attach as `lambda_context`
    #[arg(long, value_name = "ID", requires = "function_arn")]
    pub request_id: Option<String>,

    /// Invoked function ARN to attach as `lambda_context`
    #[arg(long, value_name = "ARN", requires = "request_id")]
    pub function_arn: Option<String>,
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    value
        .parse()
        .map_err(|_| format!("unknown level '{value}', expected debug, info, warning or error"))
}

/// Split `key=value`, reading the value as JSON when it parses
pub fn parse_field(raw: &str) -> Result<(String, JsonValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((key.to_string(), value))
}
