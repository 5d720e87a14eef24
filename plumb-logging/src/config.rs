use crate::error::{ConfigError, Diagnostic, LoggerError, LOGGER_PREFIX};
use plumb_interfaces::LogLevel;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Prefix for the environment variables read by [`LoggerConfig::from_env`]
pub const ENV_PREFIX: &str = "PLUMB_";

/// Logger configuration.
///
/// Level, environment and format are kept as supplied. They are resolved
/// once when the logger is built, and an unrecognized value degrades to a
/// default with a warning line rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level, by name or numeric threshold
    pub level: LevelSetting,

    /// Where the process runs: local, fargate or lambda
    pub execution_environment: String,

    /// Output format: json or text
    pub log_format: String,

    /// Whether downstream collectors should ship these lines
    #[serde(deserialize_with = "deserialize_truthy")]
    pub ship_logs: bool,

    /// Timeout for container metadata requests
    #[serde(with = "humantime_serde")]
    pub metadata_timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LevelSetting::Name(LogLevel::Info.as_str().to_string()),
            execution_environment: ExecutionEnvironment::Local.to_string(),
            log_format: LogFormat::Json.to_string(),
            ship_logs: true,
            metadata_timeout: Duration::from_secs(2),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `PLUMB_*` environment variables, defaulting anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn with_level(mut self, level: impl Into<LevelSetting>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_execution_environment(mut self, environment: impl fmt::Display) -> Self {
        self.execution_environment = environment.to_string();
        self
    }

    pub fn with_log_format(mut self, format: impl fmt::Display) -> Self {
        self.log_format = format.to_string();
        self
    }

    pub fn with_ship_logs(mut self, ship_logs: impl Into<Truthy>) -> Self {
        self.ship_logs = ship_logs.into().0;
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Settle every setting, collecting the warnings to print first
    pub fn resolve(&self) -> (ResolvedConfig, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        let level = match self.level.resolve() {
            Ok(level) => level,
            Err(err) => {
                diagnostics.push(Diagnostic::warning(
                    format!(
                        "{LOGGER_PREFIX} Log level '{}' not recognised, defaulting to INFO",
                        self.level
                    ),
                    Some(err),
                ));
                LogLevel::Info
            }
        };

        let environment = self.execution_environment.parse().unwrap_or_else(|_| {
            tracing::debug!(
                environment = %self.execution_environment,
                "Unrecognised execution environment, treating as local"
            );
            ExecutionEnvironment::Local
        });

        let mut ship_logs = self.ship_logs;
        let format = match self.log_format.parse::<LogFormat>() {
            Ok(LogFormat::Json) => LogFormat::Json,
            Ok(LogFormat::Text) => {
                if ship_logs {
                    diagnostics.push(Diagnostic::warning(shipping_disabled_message(None), None));
                    ship_logs = false;
                }
                LogFormat::Text
            }
            Err(err) => {
                diagnostics.push(Diagnostic::warning(
                    shipping_disabled_message(Some(&self.log_format)),
                    Some(err),
                ));
                ship_logs = false;
                LogFormat::Text
            }
        };

        let resolved = ResolvedConfig {
            level,
            environment,
            format,
            ship_logs,
            metadata_timeout: self.metadata_timeout,
        };
        (resolved, diagnostics)
    }
}

fn shipping_disabled_message(rejected_format: Option<&str>) -> String {
    let shipping = "Log messages cannot be shipped downstream outside of JSON format. Disabling log shipping";
    match rejected_format {
        Some(format) => {
            format!("{LOGGER_PREFIX} Log format '{format}' not recognised, using text. {shipping}")
        }
        None => format!("{LOGGER_PREFIX} {shipping}"),
    }
}

/// Configuration after every setting has been settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub level: LogLevel,
    pub environment: ExecutionEnvironment,
    pub format: LogFormat,
    pub ship_logs: bool,
    pub metadata_timeout: Duration,
}

/// Level as supplied: a name such as `"warning"` or a numeric threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSetting {
    Numeric(i64),
    Name(String),
}

impl LevelSetting {
    pub fn resolve(&self) -> Result<LogLevel, LoggerError> {
        let parsed = match self {
            LevelSetting::Numeric(value) => LogLevel::from_numeric(*value),
            LevelSetting::Name(name) => name.parse(),
        };
        parsed.map_err(|_| LoggerError::Configuration {
            setting: "log level",
            value: self.to_string(),
            fallback: LogLevel::Info.to_string(),
        })
    }
}

impl fmt::Display for LevelSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelSetting::Numeric(value) => write!(f, "{value}"),
            LevelSetting::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<LogLevel> for LevelSetting {
    fn from(level: LogLevel) -> Self {
        LevelSetting::Name(level.as_str().to_string())
    }
}

impl From<&str> for LevelSetting {
    fn from(name: &str) -> Self {
        LevelSetting::Name(name.to_string())
    }
}

impl From<String> for LevelSetting {
    fn from(name: String) -> Self {
        LevelSetting::Name(name)
    }
}

impl From<i64> for LevelSetting {
    fn from(value: i64) -> Self {
        LevelSetting::Numeric(value)
    }
}

impl From<i32> for LevelSetting {
    fn from(value: i32) -> Self {
        LevelSetting::Numeric(value.into())
    }
}

/// Runtime the process is deployed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionEnvironment {
    Local,
    /// Container platform with a task metadata endpoint
    Fargate,
    /// Serverless function runtime
    Lambda,
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionEnvironment::Local => "local",
            ExecutionEnvironment::Fargate => "fargate",
            ExecutionEnvironment::Lambda => "lambda",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ExecutionEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ExecutionEnvironment::Local),
            "fargate" | "ecs" | "container" => Ok(ExecutionEnvironment::Fargate),
            "lambda" | "serverless" => Ok(ExecutionEnvironment::Lambda),
            _ => Err(format!("Invalid execution environment: {s}")),
        }
    }
}

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFormat {
    Json,
    Text,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            _ => Err(LoggerError::Configuration {
                setting: "log format",
                value: s.to_string(),
                fallback: LogFormat::Text.to_string(),
            }),
        }
    }
}

/// A loosely typed on/off value.
///
/// Numbers are true when non-zero. Strings are true unless empty or one of
/// `0`, `false`, `no`, `off` (any case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truthy(pub bool);

impl From<bool> for Truthy {
    fn from(value: bool) -> Self {
        Truthy(value)
    }
}

impl From<i64> for Truthy {
    fn from(value: i64) -> Self {
        Truthy(value != 0)
    }
}

impl From<i32> for Truthy {
    fn from(value: i32) -> Self {
        Truthy(value != 0)
    }
}

impl From<f64> for Truthy {
    fn from(value: f64) -> Self {
        Truthy(value != 0.0)
    }
}

impl From<&str> for Truthy {
    fn from(value: &str) -> Self {
        let lowered = value.trim().to_lowercase();
        Truthy(!matches!(lowered.as_str(), "" | "0" | "false" | "no" | "off"))
    }
}

impl From<String> for Truthy {
    fn from(value: String) -> Self {
        Truthy::from(value.as_str())
    }
}

fn deserialize_truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct TruthyVisitor;

    impl<'de> Visitor<'de> for TruthyVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean, number or string")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(Truthy::from(v).0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(Truthy::from(v).0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            Ok(Truthy::from(v).0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(TruthyVisitor)
}
