// Host Log Records
//
// The host's logging subsystem hands over one record per log call. A record
// is a flat JSON object: call-site arguments are stored under their position
// ("0", "1", ...) and logger metadata under "_meta". Nothing else about the
// record is assumed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, TranslateError};

/// Key holding logger metadata
pub const META_KEY: &str = "_meta";

/// Level assumed when the record does not name one
pub const DEFAULT_LEVEL_NAME: &str = "INFO";

// ============================================================================
// LogLevel
// ============================================================================

/// Severity levels understood by the backend's structured logger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Normalize a host level name (case-insensitive).
    ///
    /// `trace` folds into debug and `fatal` into error. Anything else that is
    /// not a known level maps to info.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" | "fatal" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LogMeta
// ============================================================================

/// Logger metadata carried under `_meta`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl LogMeta {
    /// Resolved severity (defaults to info)
    pub fn level(&self) -> LogLevel {
        LogLevel::from_name(
            self.log_level_name
                .as_deref()
                .unwrap_or(DEFAULT_LEVEL_NAME),
        )
    }

    // Fields of the wrong JSON type are treated as absent.
    fn from_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            log_level_name: text("logLevelName"),
            name: text("name"),
            date: text("date"),
        }
    }
}

// ============================================================================
// LogRecord
// ============================================================================

/// One log call as delivered by the host's log transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord {
    fields: Map<String, Value>,
}

impl LogRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap a JSON value; anything but an object is malformed
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(TranslateError::malformed(format!(
                "log record must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Set the positional argument at `position`
    pub fn with_arg(mut self, position: usize, value: impl Into<Value>) -> Self {
        self.fields.insert(position.to_string(), value.into());
        self
    }

    /// Set the logger metadata
    pub fn with_meta(mut self, meta: LogMeta) -> Self {
        // LogMeta only holds strings, serialization cannot fail
        let value = serde_json::to_value(meta).unwrap_or(Value::Null);
        self.fields.insert(META_KEY.to_string(), value);
        self
    }

    /// Raw access to a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Logger metadata. A `_meta` that is absent or not an object yields
    /// defaults.
    pub fn meta(&self) -> LogMeta {
        match self.fields.get(META_KEY) {
            Some(Value::Object(object)) => LogMeta::from_object(object),
            _ => LogMeta::default(),
        }
    }

    /// Positional arguments ordered by the numeric value of their key.
    ///
    /// Transports do not keep insertion order stable, so key order is the
    /// only reliable call-site order.
    pub fn positional_args(&self) -> Vec<&Value> {
        let mut positional: Vec<(&str, &Value)> = self
            .fields
            .iter()
            .filter(|(key, _)| is_positional_key(key))
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        positional.sort_by(|(a, _), (b, _)| compare_positions(a, b));
        positional.into_iter().map(|(_, value)| value).collect()
    }
}

impl From<Map<String, Value>> for LogRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

/// True for keys made only of ASCII digits
pub fn is_positional_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

// Numeric comparison of digit strings of any length.
fn compare_positions(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
