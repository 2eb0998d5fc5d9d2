// Translation Layer
//
// Converts host payloads into backend operations. Translation is pure: it
// produces plain data (`BackendOperation`, `LogEntry`) that is applied to a
// backend as a separate step, so every mapping rule can be checked without a
// backend client.

mod diagnostic;
mod log;

pub use diagnostic::{
    translate_diagnostic, MESSAGE_DEFAULT_DURATION_MS, MODEL_USAGE_DEFAULT_DURATION_MS,
    UNKNOWN_ERROR,
};
pub use log::translate_log;

use chrono::{DateTime, Utc};
use clawtrail_core::{DiagnosticEvent, LogLevel, LogRecord, TranslateError};

use crate::backend::{
    Attributes, BackendError, MessageLevel, SpanStatus, Tags, TelemetryBackend,
};

// ============================================================================
// Backend Operations
// ============================================================================

/// A span with an explicit time window
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub op: String,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attributes: Attributes,
    pub status: Option<SpanStatus>,
}

impl SpanRecord {
    /// Span length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// A free-text message capture
#[derive(Debug, Clone, PartialEq)]
pub struct MessageCapture {
    pub message: String,
    pub level: MessageLevel,
    pub tags: Tags,
}

/// One call (or call sequence) against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOperation {
    Span(SpanRecord),
    CaptureMessage(MessageCapture),
}

impl BackendOperation {
    /// Submit this operation to a backend
    pub fn apply(&self, backend: &dyn TelemetryBackend) -> Result<(), BackendError> {
        match self {
            BackendOperation::Span(span) => {
                let handle =
                    backend.start_span(&span.op, &span.name, span.start, &span.attributes)?;
                // A backend may decline to record the span (e.g. sampled out)
                if let Some(mut handle) = handle {
                    if let Some(status) = &span.status {
                        handle.set_status(status);
                    }
                    handle.end(span.end);
                }
                Ok(())
            }
            BackendOperation::CaptureMessage(capture) => {
                backend.capture_message(&capture.message, capture.level, &capture.tags)
            }
        }
    }

    pub fn as_span(&self) -> Option<&SpanRecord> {
        match self {
            BackendOperation::Span(span) => Some(span),
            BackendOperation::CaptureMessage(_) => None,
        }
    }

    pub fn as_capture(&self) -> Option<&MessageCapture> {
        match self {
            BackendOperation::Span(_) => None,
            BackendOperation::CaptureMessage(capture) => Some(capture),
        }
    }
}

impl From<SpanRecord> for BackendOperation {
    fn from(span: SpanRecord) -> Self {
        BackendOperation::Span(span)
    }
}

impl From<MessageCapture> for BackendOperation {
    fn from(capture: MessageCapture) -> Self {
        BackendOperation::CaptureMessage(capture)
    }
}

/// One structured log call
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub attributes: Attributes,
    /// When the host produced the record, if `_meta.date` parsed
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Submit this entry to the backend's structured logger.
    ///
    /// Returns `Ok(false)` without calling anything when the backend has no
    /// structured logger.
    pub fn apply(&self, backend: &dyn TelemetryBackend) -> Result<bool, BackendError> {
        let Some(logger) = backend.structured_logger() else {
            return Ok(false);
        };
        logger.log_at(self.level, &self.message, &self.attributes, self.timestamp)?;
        Ok(true)
    }
}

// ============================================================================
// Forwarding
// ============================================================================

/// Failure while forwarding one event or record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForwardError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Translate a diagnostic event and apply the result in order.
///
/// Returns the number of operations applied. Stops at the first backend
/// failure.
pub fn forward_diagnostic(
    backend: &dyn TelemetryBackend,
    event: &DiagnosticEvent,
) -> Result<usize, ForwardError> {
    let operations = translate_diagnostic(event)?;
    for operation in &operations {
        operation.apply(backend)?;
    }
    Ok(operations.len())
}

/// Translate a log record and hand it to the backend's structured logger.
///
/// Returns whether a log call was made.
pub fn forward_log(
    backend: &dyn TelemetryBackend,
    record: &LogRecord,
) -> Result<bool, ForwardError> {
    if backend.structured_logger().is_none() {
        return Ok(false);
    }
    let entry = translate_log(record)?;
    Ok(entry.apply(backend)?)
}
