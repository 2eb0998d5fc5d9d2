// Diagnostic Event Protocol
//
// This module defines the diagnostic events the host application emits.
// Events arrive as JSON objects discriminated by a `type` field in dot
// notation (e.g. "model.usage"). Only the kinds listed below carry a
// telemetry mapping; every other kind decodes to `DiagnosticEvent::Other`
// and is ignored downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Event Type Constants
// ============================================================================

// Model usage
pub const MODEL_USAGE: &str = "model.usage";

// Message lifecycle
pub const MESSAGE_PROCESSED: &str = "message.processed";
pub const MESSAGE_QUEUED: &str = "message.queued";

// Webhooks
pub const WEBHOOK_ERROR: &str = "webhook.error";
pub const WEBHOOK_RECEIVED: &str = "webhook.received";
pub const WEBHOOK_PROCESSED: &str = "webhook.processed";

// Session health
pub const SESSION_STUCK: &str = "session.stuck";
pub const SESSION_STATE: &str = "session.state";

// Queue lanes and runs
pub const QUEUE_LANE_ENQUEUE: &str = "queue.lane.enqueue";
pub const QUEUE_LANE_DEQUEUE: &str = "queue.lane.dequeue";
pub const RUN_ATTEMPT: &str = "run.attempt";

// Liveness
pub const DIAGNOSTIC_HEARTBEAT: &str = "diagnostic.heartbeat";

/// Event type reported for kinds without a dedicated variant
pub const OTHER: &str = "other";

// ============================================================================
// DiagnosticEvent
// ============================================================================

/// A discrete notification emitted by the host.
///
/// The enum is internally tagged on `type`. Unknown kinds are not an error:
/// they deserialize to [`DiagnosticEvent::Other`] so a newer host can emit
/// kinds this crate has never heard of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiagnosticEvent {
    #[serde(rename = "model.usage")]
    ModelUsage(ModelUsageData),

    #[serde(rename = "message.processed")]
    MessageProcessed(MessageProcessedData),

    #[serde(rename = "webhook.error")]
    WebhookError(WebhookErrorData),

    #[serde(rename = "session.stuck")]
    SessionStuck(SessionStuckData),

    #[serde(rename = "other")]
    #[serde(other)]
    Other,
}

impl DiagnosticEvent {
    /// Get the event type constant for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            DiagnosticEvent::ModelUsage(_) => MODEL_USAGE,
            DiagnosticEvent::MessageProcessed(_) => MESSAGE_PROCESSED,
            DiagnosticEvent::WebhookError(_) => WEBHOOK_ERROR,
            DiagnosticEvent::SessionStuck(_) => SESSION_STUCK,
            DiagnosticEvent::Other => OTHER,
        }
    }

    /// Decode an event from the host's JSON representation
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Decode an event from an already-parsed JSON value
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

impl From<ModelUsageData> for DiagnosticEvent {
    fn from(data: ModelUsageData) -> Self {
        DiagnosticEvent::ModelUsage(data)
    }
}

impl From<MessageProcessedData> for DiagnosticEvent {
    fn from(data: MessageProcessedData) -> Self {
        DiagnosticEvent::MessageProcessed(data)
    }
}

impl From<WebhookErrorData> for DiagnosticEvent {
    fn from(data: WebhookErrorData) -> Self {
        DiagnosticEvent::WebhookError(data)
    }
}

impl From<SessionStuckData> for DiagnosticEvent {
    fn from(data: SessionStuckData) -> Self {
        DiagnosticEvent::SessionStuck(data)
    }
}

// ============================================================================
// Event Data Types
// ============================================================================

/// Data for model.usage events
///
/// `ts` marks the moment the model call finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageData {
    /// Completion time (epoch milliseconds)
    #[serde(deserialize_with = "whole::signed")]
    pub ts: i64,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    #[serde(default)]
    pub usage: TokenUsage,
}

/// Token counts reported with a model call. Every count is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<u64>,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub output: Option<u64>,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_read: Option<u64>,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_write: Option<u64>,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<u64>,
}

/// Data for message.processed events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageProcessedData {
    /// Completion time (epoch milliseconds)
    #[serde(deserialize_with = "whole::signed")]
    pub ts: i64,

    #[serde(
        default,
        deserialize_with = "whole::unsigned_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,

    pub channel: String,

    pub outcome: MessageOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Identifier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Identifier>,

    /// Error text, only reported when `outcome` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Data for webhook.error events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookErrorData {
    pub error: String,
    pub channel: String,
    pub update_type: String,
}

/// Data for session.stuck events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStuckData {
    pub session_key: String,
    #[serde(deserialize_with = "whole::unsigned")]
    pub age_ms: u64,
    pub state: String,
}

// ============================================================================
// MessageOutcome
// ============================================================================

/// How the host finished processing an inbound message.
///
/// Outcomes the host adds later are preserved verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageOutcome {
    #[default]
    Completed,
    Skipped,
    Error,
    Other(String),
}

impl MessageOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            MessageOutcome::Completed => "completed",
            MessageOutcome::Skipped => "skipped",
            MessageOutcome::Error => "error",
            MessageOutcome::Other(outcome) => outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MessageOutcome::Error)
    }
}

impl From<String> for MessageOutcome {
    fn from(value: String) -> Self {
        match value.as_str() {
            "completed" => MessageOutcome::Completed,
            "skipped" => MessageOutcome::Skipped,
            "error" => MessageOutcome::Error,
            _ => MessageOutcome::Other(value),
        }
    }
}

impl From<&str> for MessageOutcome {
    fn from(value: &str) -> Self {
        MessageOutcome::from(value.to_string())
    }
}

impl From<MessageOutcome> for String {
    fn from(outcome: MessageOutcome) -> Self {
        match outcome {
            MessageOutcome::Other(outcome) => outcome,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Identifier
// ============================================================================

/// Chat and message ids arrive as strings on some channels and as integers
/// on others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Text(String),
    Number(i64),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Text(text) => f.write_str(text),
            Identifier::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Text(value)
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Number(value)
    }
}

// ============================================================================
// Whole Numbers
// ============================================================================

// The host writes plain JSON numbers. Counts, durations and timestamps are
// whole by meaning, so a fractional value is truncated toward zero instead
// of failing the whole event.
mod whole {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    fn to_signed(number: &Number) -> Option<i64> {
        number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.trunc() as i64))
    }

    fn to_unsigned(number: &Number) -> Option<u64> {
        number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| *value > -1.0)
                .map(|value| value.trunc() as u64)
        })
    }

    pub fn signed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let number = Number::deserialize(deserializer)?;
        to_signed(&number)
            .ok_or_else(|| D::Error::custom(format!("expected a number, got {}", number)))
    }

    pub fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let number = Number::deserialize(deserializer)?;
        to_unsigned(&number).ok_or_else(|| {
            D::Error::custom(format!("expected a non-negative number, got {}", number))
        })
    }

    pub fn unsigned_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Option::<Number>::deserialize(deserializer)?
            .map(|number| {
                to_unsigned(&number).ok_or_else(|| {
                    D::Error::custom(format!("expected a non-negative number, got {}", number))
                })
            })
            .transpose()
    }
}
