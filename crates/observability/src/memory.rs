// In-memory backend for examples and testing
//
// RecordingBackend keeps every call it receives in memory, making it useful
// for:
// - Host crates testing their bridge wiring without a network backend
// - Unit and integration tests of the translation rules
// - Demos that print what would have been sent
//
// It can also simulate failures: rejecting the Nth call, stalling or failing
// flushes, and running with the structured logger disabled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clawtrail_core::LogLevel;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::backend::{
    Attributes, BackendError, BackendOptions, MessageLevel, SpanHandle, SpanStatus,
    StructuredLogger, Tags, TelemetryBackend,
};

// ============================================================================
// Recorded Items
// ============================================================================

/// A span as the backend saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub op: String,
    pub name: String,
    pub start: DateTime<Utc>,
    /// Set once the span handle is ended
    pub end: Option<DateTime<Utc>>,
    pub attributes: Attributes,
    pub status: Option<SpanStatus>,
}

impl RecordedSpan {
    /// Span length in milliseconds, once ended
    pub fn duration_ms(&self) -> Option<i64> {
        self.end.map(|end| (end - self.start).num_milliseconds())
    }
}

/// A message capture as the backend saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCapture {
    pub message: String,
    pub level: MessageLevel,
    pub tags: Tags,
}

/// A structured log call as the backend saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLog {
    pub level: LogLevel,
    pub message: String,
    pub attributes: Attributes,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Recording {
    inits: Vec<BackendOptions>,
    spans: Vec<RecordedSpan>,
    captures: Vec<RecordedCapture>,
    logs: Vec<RecordedLog>,
    flush_timeouts: Vec<Duration>,
    /// Span, capture and log calls seen so far
    calls: usize,
    fail_on_call: Option<usize>,
}

impl Recording {
    // Counts the call and rejects it when it is the injected failure.
    fn admit(&mut self) -> Result<(), BackendError> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(BackendError::Rejected(format!(
                "injected failure on call {}",
                self.calls
            )));
        }
        Ok(())
    }
}

type SharedRecording = Arc<Mutex<Recording>>;

fn lock(state: &SharedRecording) -> MutexGuard<'_, Recording> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// RecordingBackend
// ============================================================================

/// In-memory backend that records every call
///
/// Clones share the same recording, so a test can keep one handle while the
/// bridge owns another.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    state: SharedRecording,
    logger: Option<RecordingLogger>,
    flush_delay: Option<Duration>,
    fail_flush: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Create a new recording backend with structured logging enabled
    pub fn new() -> Self {
        let state = SharedRecording::default();
        Self {
            logger: Some(RecordingLogger {
                state: Arc::clone(&state),
            }),
            state,
            flush_delay: None,
            fail_flush: false,
        }
    }

    /// Disable the structured logger
    pub fn without_logs(mut self) -> Self {
        self.logger = None;
        self
    }

    /// Reject the Nth span, capture or log call (1-based)
    pub fn fail_on_call(self, call: usize) -> Self {
        lock(&self.state).fail_on_call = Some(call);
        self
    }

    /// Make every flush take this long before completing
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = Some(delay);
        self
    }

    /// Make every flush fail
    pub fn with_failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    /// Options of every init call
    pub fn inits(&self) -> Vec<BackendOptions> {
        lock(&self.state).inits.clone()
    }

    pub fn init_count(&self) -> usize {
        lock(&self.state).inits.len()
    }

    /// Recorded spans in start order
    pub fn spans(&self) -> Vec<RecordedSpan> {
        lock(&self.state).spans.clone()
    }

    /// Recorded message captures
    pub fn captures(&self) -> Vec<RecordedCapture> {
        lock(&self.state).captures.clone()
    }

    /// Recorded structured log calls
    pub fn logs(&self) -> Vec<RecordedLog> {
        lock(&self.state).logs.clone()
    }

    /// Number of flush calls (including failed or stalled ones)
    pub fn flush_count(&self) -> usize {
        lock(&self.state).flush_timeouts.len()
    }

    /// Timeouts passed to flush, in call order
    pub fn flush_timeouts(&self) -> Vec<Duration> {
        lock(&self.state).flush_timeouts.clone()
    }

    /// Span, capture and log calls seen so far (including rejected ones)
    pub fn call_count(&self) -> usize {
        lock(&self.state).calls
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.inits.clear();
        state.spans.clear();
        state.captures.clear();
        state.logs.clear();
        state.flush_timeouts.clear();
        state.calls = 0;
    }
}

#[async_trait]
impl TelemetryBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn init(&self, options: &BackendOptions) -> Result<(), BackendError> {
        lock(&self.state).inits.push(options.clone());
        Ok(())
    }

    fn start_span(
        &self,
        op: &str,
        name: &str,
        start_time: DateTime<Utc>,
        attributes: &Attributes,
    ) -> Result<Option<Box<dyn SpanHandle>>, BackendError> {
        let mut state = lock(&self.state);
        state.admit()?;
        state.spans.push(RecordedSpan {
            op: op.to_string(),
            name: name.to_string(),
            start: start_time,
            end: None,
            attributes: attributes.clone(),
            status: None,
        });

        Ok(Some(Box::new(RecordingSpan {
            state: Arc::clone(&self.state),
            index: state.spans.len() - 1,
        })))
    }

    fn capture_message(
        &self,
        message: &str,
        level: MessageLevel,
        tags: &Tags,
    ) -> Result<(), BackendError> {
        let mut state = lock(&self.state);
        state.admit()?;
        state.captures.push(RecordedCapture {
            message: message.to_string(),
            level,
            tags: tags.clone(),
        });
        Ok(())
    }

    fn structured_logger(&self) -> Option<&dyn StructuredLogger> {
        self.logger.as_ref().map(|logger| logger as &dyn StructuredLogger)
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BackendError> {
        lock(&self.state).flush_timeouts.push(timeout);

        if let Some(delay) = self.flush_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_flush {
            return Err(BackendError::Export("flush failed".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Span and Logger Handles
// ============================================================================

struct RecordingSpan {
    state: SharedRecording,
    index: usize,
}

impl SpanHandle for RecordingSpan {
    fn set_status(&mut self, status: &SpanStatus) {
        if let Some(span) = lock(&self.state).spans.get_mut(self.index) {
            span.status = Some(status.clone());
        }
    }

    fn end(self: Box<Self>, end_time: DateTime<Utc>) {
        if let Some(span) = lock(&self.state).spans.get_mut(self.index) {
            span.end = Some(end_time);
        }
    }
}

#[derive(Debug, Clone)]
struct RecordingLogger {
    state: SharedRecording,
}

impl StructuredLogger for RecordingLogger {
    fn log(
        &self,
        level: LogLevel,
        message: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        self.log_at(level, message, attributes, None)
    }

    fn log_at(
        &self,
        level: LogLevel,
        message: &str,
        attributes: &Attributes,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), BackendError> {
        let mut state = lock(&self.state);
        state.admit()?;
        state.logs.push(RecordedLog {
            level,
            message: message.to_string(),
            attributes: attributes.clone(),
            timestamp,
        });
        Ok(())
    }
}
