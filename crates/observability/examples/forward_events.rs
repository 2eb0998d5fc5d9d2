// Forward a sample of host diagnostics through the bridge
//
// Wires an in-process event bus to a DiagnosticsBridge backed by the
// recording backend, emits a few events and log records, and prints what the
// backend received.
//
// Run with: cargo run -p clawtrail-observability --example forward_events
//
// Set CLAWTRAIL_DSN (or put it in .env) to change the DSN passed to init.

use std::sync::Arc;

use anyhow::Result;
use clawtrail_core::telemetry::{init_telemetry, TelemetryConfig};
use clawtrail_core::{DiagnosticEvent, EventBus, LogRecord};
use clawtrail_observability::{BridgeConfig, DiagnosticsBridge, RecordingBackend};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env())?;

    let mut config = BridgeConfig::from_env();
    if config.dsn().is_none() {
        config.dsn = Some("http://localhost:4318".to_string());
    }

    let events = EventBus::<DiagnosticEvent>::new();
    let logs = EventBus::<LogRecord>::new();
    let backend = RecordingBackend::new();

    let mut bridge = DiagnosticsBridge::new(Arc::new(backend.clone()));
    bridge.start(&config, &events, &logs);

    let samples = [
        json!({
            "type": "model.usage",
            "ts": 1_700_000_000_000_i64,
            "durationMs": 1840,
            "model": "claude-sonnet-4",
            "provider": "anthropic",
            "channel": "telegram",
            "sessionKey": "agent:main:telegram:42",
            "costUsd": 0.0213,
            "usage": { "input": 5120, "output": 410, "cacheRead": 4096, "total": 9626 }
        }),
        json!({
            "type": "message.processed",
            "ts": 1_700_000_000_500_i64,
            "channel": "telegram",
            "outcome": "error",
            "sessionKey": "agent:main:telegram:42",
            "chatId": 42,
            "error": "model request timed out"
        }),
        json!({
            "type": "webhook.error",
            "error": "signature mismatch",
            "channel": "slack",
            "updateType": "event_callback"
        }),
        json!({
            "type": "session.stuck",
            "sessionKey": "agent:main:discord:7",
            "ageMs": 185000,
            "state": "processing"
        }),
        json!({ "type": "diagnostic.heartbeat", "ts": 1_700_000_001_000_i64 }),
    ];
    for sample in samples {
        events.emit(&DiagnosticEvent::from_value(sample)?);
    }

    logs.emit(&LogRecord::from_value(json!({
        "0": "{\"subsystem\":\"gateway\"}",
        "1": "listening on :18789",
        "_meta": { "logLevelName": "INFO", "name": "gateway" }
    }))?);
    logs.emit(&LogRecord::from_value(json!({
        "0": "reconnect failed",
        "_meta": { "logLevelName": "WARN", "name": "channels/discord" }
    }))?);

    bridge.stop().await;

    for span in backend.spans() {
        println!(
            "span     {:<18} {:<24} {:>5}ms status={:?}",
            span.op,
            span.name,
            span.duration_ms().unwrap_or_default(),
            span.status.map(|status| status.message)
        );
    }
    for capture in backend.captures() {
        println!(
            "capture  {:<7} {} {:?}",
            capture.level.as_str(),
            capture.message,
            capture.tags
        );
    }
    for log in backend.logs() {
        println!(
            "log      {:<5} {} {:?}",
            log.level.as_str(),
            log.message,
            log.attributes
        );
    }
    println!("flushes  {}", backend.flush_count());

    Ok(())
}
