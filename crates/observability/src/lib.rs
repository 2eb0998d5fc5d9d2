// Observability Bridge for Clawtrail
//
// This crate forwards host diagnostics and logs to an observability backend.
// Key design decisions:
// - Uses event subscription pattern so the host never depends on a backend
// - Supports any backend via the TelemetryBackend trait
// - Translation is pure and returns operations as data
// - OpenTelemetry OTLP export is feature-flagged to minimize dependencies

pub mod backend;
pub mod bridge;
pub mod config;
pub mod memory;
pub mod translate;

#[cfg(feature = "otel")]
pub mod otel;

// Re-exports
pub use backend::{
    Attributes, BackendError, BackendOptions, MessageLevel, NoopBackend, SpanHandle, SpanStatus,
    StatusCode, StructuredLogger, Tags, TelemetryBackend,
};
pub use bridge::{DiagnosticsBridge, StartOutcome, FLUSH_TIMEOUT};
pub use config::{BridgeConfig, ConfigError};
pub use memory::{RecordedCapture, RecordedLog, RecordedSpan, RecordingBackend};
pub use translate::{
    forward_diagnostic, forward_log, translate_diagnostic, translate_log, BackendOperation,
    ForwardError, LogEntry, MessageCapture, SpanRecord,
};

#[cfg(feature = "otel")]
pub use otel::OtelBackend;
