// Observability Backend Trait
//
// Defines the interface for the observability backend client. The bridge
// owns exactly one backend handle: it initializes it once on start and
// flushes it on stop. Translated diagnostics reach the backend as spans and
// message captures; translated log records reach its structured logger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clawtrail_core::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Span and log attributes, ordered by key
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Message capture tags, ordered by key
pub type Tags = BTreeMap<String, String>;

// ============================================================================
// Options and Levels
// ============================================================================

/// Options passed to [`TelemetryBackend::init`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendOptions {
    pub dsn: String,
    pub environment: String,
    pub traces_sample_rate: f64,
    pub enable_logs: bool,
}

/// Severity of a message capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Span status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    InternalError,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::InternalError => "internal_error",
        }
    }
}

/// Status attached to a span before it ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl SpanStatus {
    /// Error status with a message
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::InternalError,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code != StatusCode::Ok
    }
}

// ============================================================================
// Backend Traits
// ============================================================================

/// A started span. Ending consumes the handle.
pub trait SpanHandle: Send {
    fn set_status(&mut self, status: &SpanStatus);

    fn end(self: Box<Self>, end_time: DateTime<Utc>);
}

/// Structured logging facility of a backend
pub trait StructuredLogger: Send + Sync {
    fn log(
        &self,
        level: LogLevel,
        message: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError>;

    /// Log with the time the host produced the record, when known.
    /// Loggers that cannot carry a timestamp fall back to `log`.
    fn log_at(
        &self,
        level: LogLevel,
        message: &str,
        attributes: &Attributes,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BackendError> {
        let _ = timestamp;
        self.log(level, message, attributes)
    }

    fn debug(&self, message: &str, attributes: &Attributes) -> Result<(), BackendError> {
        self.log(LogLevel::Debug, message, attributes)
    }

    fn info(&self, message: &str, attributes: &Attributes) -> Result<(), BackendError> {
        self.log(LogLevel::Info, message, attributes)
    }

    fn warn(&self, message: &str, attributes: &Attributes) -> Result<(), BackendError> {
        self.log(LogLevel::Warn, message, attributes)
    }

    fn error(&self, message: &str, attributes: &Attributes) -> Result<(), BackendError> {
        self.log(LogLevel::Error, message, attributes)
    }
}

/// Trait for observability backend clients
///
/// Implementations translate spans, captures and structured logs into their
/// provider's wire format. All calls except `flush` are synchronous and must
/// not block; batching belongs to the implementation.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;

    /// Initialize the client. Called once per bridge start.
    fn init(&self, options: &BackendOptions) -> Result<(), BackendError>;

    /// Start a span. `None` means the backend chose not to record it.
    fn start_span(
        &self,
        op: &str,
        name: &str,
        start_time: DateTime<Utc>,
        attributes: &Attributes,
    ) -> Result<Option<Box<dyn SpanHandle>>, BackendError>;

    /// Capture a free-text message
    fn capture_message(
        &self,
        message: &str,
        level: MessageLevel,
        tags: &Tags,
    ) -> Result<(), BackendError>;

    /// The structured logger, absent when logging is disabled
    fn structured_logger(&self) -> Option<&dyn StructuredLogger>;

    /// Flush pending telemetry (called on shutdown)
    async fn flush(&self, timeout: Duration) -> Result<(), BackendError>;
}

/// Errors that can occur during backend operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Backend not initialized")]
    NotInitialized,

    #[error("Backend already initialized")]
    AlreadyInitialized,
}

// ============================================================================
// NoopBackend
// ============================================================================

/// A no-op backend for when observability is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

#[async_trait]
impl TelemetryBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn init(&self, _options: &BackendOptions) -> Result<(), BackendError> {
        Ok(())
    }

    fn start_span(
        &self,
        _op: &str,
        _name: &str,
        _start_time: DateTime<Utc>,
        _attributes: &Attributes,
    ) -> Result<Option<Box<dyn SpanHandle>>, BackendError> {
        Ok(None)
    }

    fn capture_message(
        &self,
        _message: &str,
        _level: MessageLevel,
        _tags: &Tags,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn structured_logger(&self) -> Option<&dyn StructuredLogger> {
        None
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), BackendError> {
        Ok(())
    }
}
