// Log Record Translator
//
// One host log record becomes one structured log entry. The last positional
// argument is the message when it is a string; every other positional
// argument travels as a JSON array under `openclaw.args`. A `_meta.date`
// that parses as RFC 3339 becomes the entry's timestamp.

use chrono::{DateTime, Utc};
use clawtrail_core::telemetry::openclaw;
use clawtrail_core::{LogRecord, Result, TranslateError};
use serde_json::Value;

use super::LogEntry;
use crate::backend::Attributes;

/// Translate one log record into a structured log entry
pub fn translate_log(record: &LogRecord) -> Result<LogEntry> {
    let meta = record.meta();
    let mut args = record.positional_args();

    let message = match args.last() {
        Some(Value::String(text)) => {
            let text = text.clone();
            args.pop();
            text
        }
        _ => String::new(),
    };
    let message = if message.is_empty() {
        openclaw::DEFAULT_LOG_MESSAGE.to_string()
    } else {
        message
    };

    let mut attributes = Attributes::new();
    attributes.insert(
        openclaw::LOGGER.to_string(),
        Value::from(meta.name.as_deref().unwrap_or(openclaw::DEFAULT_LOGGER)),
    );
    if !args.is_empty() {
        let serialized = serde_json::to_string(&args)
            .map_err(|e| TranslateError::malformed(format!("unserializable args: {}", e)))?;
        attributes.insert(openclaw::ARGS.to_string(), Value::String(serialized));
    }

    Ok(LogEntry {
        level: meta.level(),
        message,
        attributes,
        timestamp: meta.date.as_deref().and_then(parse_date),
    })
}

// Unparseable dates fall back to the logger's own clock.
fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawtrail_core::LogLevel;
    use serde_json::json;

    fn record(value: Value) -> LogRecord {
        LogRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_last_string_is_message() {
        let entry = translate_log(&record(json!({
            "0": "subsystem-x",
            "1": "hello",
            "_meta": { "logLevelName": "WARN" }
        })))
        .unwrap();

        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.attributes[openclaw::ARGS], json!("[\"subsystem-x\"]"));
        assert_eq!(entry.attributes[openclaw::LOGGER], json!("openclaw"));
    }

    #[test]
    fn test_single_string_has_no_args() {
        let entry = translate_log(&record(json!({ "0": "gateway started" }))).unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "gateway started");
        assert!(!entry.attributes.contains_key(openclaw::ARGS));
    }

    #[test]
    fn test_non_string_last_keeps_all_args() {
        let entry = translate_log(&record(json!({
            "0": "payload",
            "1": { "bytes": 512 }
        })))
        .unwrap();

        assert_eq!(entry.message, "log");
        assert_eq!(
            entry.attributes[openclaw::ARGS],
            json!("[\"payload\",{\"bytes\":512}]")
        );
    }

    #[test]
    fn test_numeric_key_order() {
        let entry = translate_log(&record(json!({
            "10": "last",
            "2": 2,
            "1": 1
        })))
        .unwrap();

        assert_eq!(entry.message, "last");
        assert_eq!(entry.attributes[openclaw::ARGS], json!("[1,2]"));
    }

    #[test]
    fn test_empty_record() {
        let entry = translate_log(&LogRecord::new()).unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "log");
        assert_eq!(entry.attributes.len(), 1);
    }

    #[test]
    fn test_empty_string_message_falls_back() {
        let entry = translate_log(&record(json!({ "0": "ctx", "1": "" }))).unwrap();
        assert_eq!(entry.message, "log");
        assert_eq!(entry.attributes[openclaw::ARGS], json!("[\"ctx\"]"));
    }

    #[test]
    fn test_meta_name_and_level_folding() {
        let entry = translate_log(&record(json!({
            "0": "tick",
            "_meta": { "logLevelName": "trace", "name": "gateway/ws" }
        })))
        .unwrap();
        assert_eq!(entry.level, LogLevel::Debug);
        assert_eq!(entry.attributes[openclaw::LOGGER], json!("gateway/ws"));

        let entry = translate_log(&record(json!({
            "0": "crash",
            "_meta": { "logLevelName": "FATAL" }
        })))
        .unwrap();
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[test]
    fn test_non_positional_keys_ignored() {
        let entry = translate_log(&record(json!({
            "0": "hello",
            "extra": "ignored",
            "0x": "ignored"
        })))
        .unwrap();
        assert_eq!(entry.message, "hello");
        assert!(!entry.attributes.contains_key(openclaw::ARGS));
    }

    #[test]
    fn test_non_object_meta_uses_defaults() {
        let entry = translate_log(&record(json!({ "0": "x", "_meta": "WARN" }))).unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "x");
        assert_eq!(entry.attributes[openclaw::LOGGER], json!("openclaw"));
        assert_eq!(entry.timestamp, None);
    }

    #[test]
    fn test_meta_date_becomes_timestamp() {
        let entry = translate_log(&record(json!({
            "0": "ready",
            "_meta": { "date": "2026-03-01T12:30:00.250Z" }
        })))
        .unwrap();
        assert_eq!(
            entry.timestamp.map(|ts| ts.timestamp_millis()),
            Some(1_772_368_200_250)
        );

        let entry = translate_log(&record(json!({
            "0": "ready",
            "_meta": { "date": "yesterday" }
        })))
        .unwrap();
        assert_eq!(entry.timestamp, None);
    }
}
