// Diagnostic Event Translator
//
// Maps each diagnostic event kind to spans and message captures:
// - model.usage        -> one "ai.chat" span with GenAI usage attributes
// - message.processed  -> one "openclaw.message" span, plus an error capture
//                         when processing failed with an error text
// - webhook.error      -> one error capture
// - session.stuck      -> one warning capture
// - anything else      -> nothing
//
// Event timestamps mark the END of the work they describe; the span start is
// derived by subtracting the duration.

use chrono::{DateTime, TimeDelta, Utc};
use clawtrail_core::telemetry::{chat_span_name, gen_ai, message_span_name, openclaw};
use clawtrail_core::{
    DiagnosticEvent, MessageProcessedData, ModelUsageData, Result, SessionStuckData,
    TranslateError, WebhookErrorData,
};
use serde_json::Value;

use super::{BackendOperation, MessageCapture, SpanRecord};
use crate::backend::{Attributes, MessageLevel, SpanStatus, Tags};

/// Span length assumed for model calls that report no duration
pub const MODEL_USAGE_DEFAULT_DURATION_MS: u64 = 100;

/// Span length assumed for processed messages that report no duration
pub const MESSAGE_DEFAULT_DURATION_MS: u64 = 50;

/// Span status text for failed messages without an error text
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Translate one diagnostic event into backend operations.
///
/// Unknown kinds yield an empty list.
pub fn translate_diagnostic(event: &DiagnosticEvent) -> Result<Vec<BackendOperation>> {
    match event {
        DiagnosticEvent::ModelUsage(data) => Ok(vec![model_usage(data)?.into()]),
        DiagnosticEvent::MessageProcessed(data) => message_processed(data),
        DiagnosticEvent::WebhookError(data) => Ok(vec![webhook_error(data).into()]),
        DiagnosticEvent::SessionStuck(data) => Ok(vec![session_stuck(data).into()]),
        DiagnosticEvent::Other => Ok(Vec::new()),
    }
}

fn model_usage(data: &ModelUsageData) -> Result<SpanRecord> {
    let duration_ms = data.duration_ms.unwrap_or(MODEL_USAGE_DEFAULT_DURATION_MS);
    let (start, end) = span_window(data.ts, duration_ms)?;

    let cost_usd = data.cost_usd.unwrap_or(0.0);
    if !cost_usd.is_finite() {
        return Err(TranslateError::NonFiniteValue("costUsd"));
    }

    let model = data.model.as_deref().unwrap_or(openclaw::UNKNOWN);
    let usage = &data.usage;

    let mut attributes = Attributes::new();
    insert(&mut attributes, gen_ai::OPERATION_NAME, gen_ai::operation::CHAT);
    insert(
        &mut attributes,
        gen_ai::SYSTEM,
        data.provider.as_deref().unwrap_or(openclaw::UNKNOWN),
    );
    insert(&mut attributes, gen_ai::REQUEST_MODEL, model);
    insert(&mut attributes, gen_ai::USAGE_INPUT_TOKENS, usage.input.unwrap_or(0));
    insert(&mut attributes, gen_ai::USAGE_OUTPUT_TOKENS, usage.output.unwrap_or(0));
    insert(
        &mut attributes,
        openclaw::CHANNEL,
        data.channel.as_deref().unwrap_or(openclaw::UNKNOWN),
    );
    insert(
        &mut attributes,
        openclaw::SESSION_KEY,
        data.session_key.as_deref().unwrap_or(openclaw::UNKNOWN),
    );
    insert(
        &mut attributes,
        openclaw::USAGE_CACHE_READ_TOKENS,
        usage.cache_read.unwrap_or(0),
    );
    insert(
        &mut attributes,
        openclaw::USAGE_CACHE_WRITE_TOKENS,
        usage.cache_write.unwrap_or(0),
    );
    insert(&mut attributes, openclaw::USAGE_TOTAL_TOKENS, usage.total.unwrap_or(0));
    insert(&mut attributes, openclaw::COST_USD, cost_usd);
    insert(&mut attributes, openclaw::DURATION_MS, data.duration_ms.unwrap_or(0));

    Ok(SpanRecord {
        op: openclaw::op::AI_CHAT.to_string(),
        name: chat_span_name(model),
        start,
        end,
        attributes,
        status: None,
    })
}

fn message_processed(data: &MessageProcessedData) -> Result<Vec<BackendOperation>> {
    let duration_ms = data.duration_ms.unwrap_or(MESSAGE_DEFAULT_DURATION_MS);
    let (start, end) = span_window(data.ts, duration_ms)?;
    let outcome = data.outcome.as_str();
    let session_key = data.session_key.as_deref().unwrap_or(openclaw::UNKNOWN);

    let mut attributes = Attributes::new();
    insert(&mut attributes, openclaw::CHANNEL, data.channel.as_str());
    insert(&mut attributes, openclaw::OUTCOME, outcome);
    insert(&mut attributes, openclaw::SESSION_KEY, session_key);
    insert(
        &mut attributes,
        openclaw::CHAT_ID,
        data.chat_id.as_ref().map(ToString::to_string).unwrap_or_default(),
    );
    insert(
        &mut attributes,
        openclaw::MESSAGE_ID,
        data.message_id.as_ref().map(ToString::to_string).unwrap_or_default(),
    );
    insert(&mut attributes, openclaw::DURATION_MS, data.duration_ms.unwrap_or(0));

    let status = data.outcome.is_error().then(|| {
        SpanStatus::internal_error(data.error.as_deref().unwrap_or(UNKNOWN_ERROR))
    });

    let mut operations = vec![BackendOperation::Span(SpanRecord {
        op: openclaw::op::MESSAGE.to_string(),
        name: message_span_name(outcome),
        start,
        end,
        attributes,
        status,
    })];

    if data.outcome.is_error() {
        if let Some(error) = &data.error {
            let mut tags = Tags::new();
            tags.insert(openclaw::tag::CHANNEL.to_string(), data.channel.clone());
            if let Some(session_key) = &data.session_key {
                tags.insert(openclaw::tag::SESSION_KEY.to_string(), session_key.clone());
            }
            operations.push(
                MessageCapture {
                    message: format!("Message processing error: {}", error),
                    level: MessageLevel::Error,
                    tags,
                }
                .into(),
            );
        }
    }

    Ok(operations)
}

fn webhook_error(data: &WebhookErrorData) -> MessageCapture {
    let mut tags = Tags::new();
    tags.insert(openclaw::tag::CHANNEL.to_string(), data.channel.clone());
    tags.insert(openclaw::tag::UPDATE_TYPE.to_string(), data.update_type.clone());

    MessageCapture {
        message: format!("Webhook error: {}", data.error),
        level: MessageLevel::Error,
        tags,
    }
}

fn session_stuck(data: &SessionStuckData) -> MessageCapture {
    let mut tags = Tags::new();
    tags.insert(openclaw::tag::SESSION_KEY.to_string(), data.session_key.clone());
    tags.insert(openclaw::tag::STATE.to_string(), data.state.clone());

    MessageCapture {
        message: format!("Session stuck: {} ({}ms)", data.session_key, data.age_ms),
        level: MessageLevel::Warning,
        tags,
    }
}

/// Derive `(start, end)` from an end timestamp and a duration
fn span_window(ts: i64, duration_ms: u64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end = DateTime::from_timestamp_millis(ts).ok_or(TranslateError::InvalidTimestamp(ts))?;
    let overflow = TranslateError::TimestampOverflow { ts, duration_ms };

    let delta = i64::try_from(duration_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .ok_or_else(|| overflow.clone())?;
    let start = end.checked_sub_signed(delta).ok_or(overflow)?;

    Ok((start, end))
}

fn insert(attributes: &mut Attributes, key: &str, value: impl Into<Value>) {
    attributes.insert(key.to_string(), value.into());
}
