// Clawtrail Core
//
// Host-facing data model for forwarding diagnostics to an observability
// backend. This crate knows nothing about any backend client.
//
// Key design decisions:
// - Diagnostic events are a strict serde-tagged enum; unknown kinds decode to Other
// - Log records stay raw JSON objects; positional arguments are ordered by numeric key
// - Event sources are traits so hosts can plug in their own bus
// - Attribute names live in one place (telemetry) and are shared by translators and backends

pub mod error;
pub mod events;
pub mod log_record;
pub mod sources;
pub mod telemetry;

// Re-exports for convenience
pub use error::{Result, TranslateError};
pub use events::{
    DiagnosticEvent, Identifier, MessageOutcome, MessageProcessedData, ModelUsageData,
    SessionStuckData, TokenUsage, WebhookErrorData, MESSAGE_PROCESSED, MODEL_USAGE,
    SESSION_STUCK, WEBHOOK_ERROR,
};
pub use log_record::{LogLevel, LogMeta, LogRecord};
pub use sources::{
    BusSubscription, DiagnosticHandler, DiagnosticSource, EventBus, LogHandler, LogSource,
    Subscription,
};
