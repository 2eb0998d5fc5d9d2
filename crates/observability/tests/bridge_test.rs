// Integration tests for DiagnosticsBridge with RecordingBackend
//
// These tests drive the full path: host bus -> bridge -> translators ->
// backend, using the in-memory recorder in place of a network client.
//
// Run with: cargo test -p clawtrail-observability --test bridge_test

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clawtrail_core::{DiagnosticEvent, EventBus, LogLevel, LogRecord};
use clawtrail_observability::{
    BridgeConfig, DiagnosticsBridge, MessageLevel, RecordingBackend, SpanStatus, StartOutcome,
    FLUSH_TIMEOUT,
};
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const DSN: &str = "http://localhost:4318";
const TS: i64 = 1_700_000_000_000;

/// Host bus pair plus a bridge wired to a recording backend
struct Harness {
    events: EventBus<DiagnosticEvent>,
    logs: EventBus<LogRecord>,
    backend: RecordingBackend,
    bridge: DiagnosticsBridge,
}

impl Harness {
    fn new(backend: RecordingBackend) -> Self {
        Self {
            events: EventBus::new(),
            logs: EventBus::new(),
            bridge: DiagnosticsBridge::new(Arc::new(backend.clone())),
            backend,
        }
    }

    fn start(&mut self, config: BridgeConfig) -> StartOutcome {
        self.bridge.start(&config, &self.events, &self.logs)
    }

    fn emit(&self, event: Value) {
        let event = DiagnosticEvent::from_value(event).expect("valid event JSON");
        self.events.emit(&event);
    }

    fn log(&self, record: Value) {
        let record = LogRecord::from_value(record).expect("record must be an object");
        self.logs.emit(&record);
    }
}

fn started() -> Harness {
    let mut harness = Harness::new(RecordingBackend::new());
    assert!(harness.start(BridgeConfig::new(DSN)).is_started());
    harness
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_initializes_backend_with_defaults() {
    let harness = started();

    let inits = harness.backend.inits();
    assert_eq!(inits.len(), 1);
    assert_eq!(inits[0].dsn, DSN);
    assert_eq!(inits[0].environment, "production");
    assert_eq!(inits[0].traces_sample_rate, 1.0);
    assert!(inits[0].enable_logs);
}

#[tokio::test]
async fn test_start_without_dsn_is_inert() {
    let mut harness = Harness::new(RecordingBackend::new());

    let outcome = harness.start(BridgeConfig::from_json("{}").unwrap());
    assert_eq!(outcome, StartOutcome::NotConfigured);
    assert_eq!(harness.backend.init_count(), 0);
    assert_eq!(harness.events.subscriber_count(), 0);
    assert_eq!(harness.logs.subscriber_count(), 0);

    harness.emit(json!({
        "type": "webhook.error",
        "error": "x",
        "channel": "c",
        "updateType": "u"
    }));
    assert!(harness.backend.captures().is_empty());
}

#[tokio::test]
async fn test_stop_before_start() {
    let mut harness = Harness::new(RecordingBackend::new());
    harness.bridge.stop().await;
    harness.bridge.stop().await;
    assert_eq!(harness.backend.flush_count(), 0);
}

#[tokio::test]
async fn test_stop_twice_flushes_once() {
    let mut harness = started();

    harness.bridge.stop().await;
    harness.bridge.stop().await;

    assert_eq!(harness.backend.flush_timeouts(), vec![FLUSH_TIMEOUT]);
    assert_eq!(harness.events.subscriber_count(), 0);
    assert_eq!(harness.logs.subscriber_count(), 0);
}

#[tokio::test]
async fn test_no_delivery_after_stop() {
    let mut harness = started();
    harness.bridge.stop().await;

    harness.emit(json!({
        "type": "session.stuck",
        "sessionKey": "s",
        "ageMs": 1,
        "state": "idle"
    }));
    harness.log(json!({ "0": "after stop" }));

    assert!(harness.backend.captures().is_empty());
    assert!(harness.backend.logs().is_empty());
}

#[tokio::test]
async fn test_logs_disabled() {
    let mut harness = Harness::new(RecordingBackend::new());
    let outcome = harness.start(BridgeConfig::new(DSN).with_enable_logs(false));

    assert_eq!(outcome, StartOutcome::Started { logs: false });
    assert_eq!(harness.events.subscriber_count(), 1);
    assert_eq!(harness.logs.subscriber_count(), 0);
    assert!(!harness.backend.inits()[0].enable_logs);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_flush_is_bounded() {
    let mut harness =
        Harness::new(RecordingBackend::new().with_flush_delay(Duration::from_secs(3600)));
    assert!(harness.start(BridgeConfig::new(DSN)).is_started());

    let begun = tokio::time::Instant::now();
    harness.bridge.stop().await;

    let elapsed = begun.elapsed();
    assert!(elapsed >= FLUSH_TIMEOUT);
    assert!(elapsed < FLUSH_TIMEOUT + Duration::from_secs(1));
    assert_eq!(harness.backend.flush_count(), 1);
    assert!(!harness.bridge.is_running());
}

#[tokio::test]
async fn test_failed_flush_is_swallowed() {
    let mut harness = Harness::new(RecordingBackend::new().with_failing_flush());
    assert!(harness.start(BridgeConfig::new(DSN)).is_started());

    harness.bridge.stop().await;
    assert_eq!(harness.backend.flush_count(), 1);
}

// ============================================================================
// Diagnostic Events
// ============================================================================

#[tokio::test]
async fn test_model_usage_span() {
    let harness = started();

    harness.emit(json!({
        "type": "model.usage",
        "ts": TS,
        "model": "gpt-4o",
        "provider": "openai",
        "usage": { "input": 900, "output": 120 }
    }));

    let spans = harness.backend.spans();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.op, "ai.chat");
    assert_eq!(span.name, "chat gpt-4o");
    assert_eq!(span.duration_ms(), Some(100));
    assert_eq!(span.end.map(|end| end.timestamp_millis()), Some(TS));
    assert_eq!(span.attributes["gen_ai.system"], json!("openai"));
    assert_eq!(span.attributes["gen_ai.usage.input_tokens"], json!(900));
    assert_eq!(span.attributes["openclaw.usage.total_tokens"], json!(0));
    assert_eq!(span.attributes["openclaw.cost_usd"], json!(0.0));
}

#[tokio::test]
async fn test_message_processed_default_duration() {
    let harness = started();

    harness.emit(json!({
        "type": "message.processed",
        "ts": TS,
        "channel": "whatsapp",
        "outcome": "completed",
        "messageId": 991
    }));

    let span = &harness.backend.spans()[0];
    assert_eq!(span.name, "message.completed");
    assert_eq!(span.duration_ms(), Some(50));
    assert_eq!(span.status, None);
    assert_eq!(span.attributes["openclaw.message_id"], json!("991"));
    assert_eq!(span.attributes["openclaw.chat_id"], json!(""));
    assert!(harness.backend.captures().is_empty());
}

#[tokio::test]
async fn test_message_error_with_text() {
    let harness = started();

    harness.emit(json!({
        "type": "message.processed",
        "ts": TS,
        "channel": "telegram",
        "outcome": "error",
        "sessionKey": "agent:main",
        "error": "boom"
    }));

    let span = &harness.backend.spans()[0];
    assert_eq!(span.status, Some(SpanStatus::internal_error("boom")));

    let captures = harness.backend.captures();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].message, "Message processing error: boom");
    assert_eq!(captures[0].level, MessageLevel::Error);
    assert_eq!(captures[0].tags["channel"], "telegram");
    assert_eq!(captures[0].tags["sessionKey"], "agent:main");
}

#[tokio::test]
async fn test_message_error_without_text() {
    let harness = started();

    harness.emit(json!({
        "type": "message.processed",
        "ts": TS,
        "channel": "telegram",
        "outcome": "error"
    }));

    let span = &harness.backend.spans()[0];
    assert_eq!(span.status, Some(SpanStatus::internal_error("unknown error")));
    assert!(harness.backend.captures().is_empty());
}

#[tokio::test]
async fn test_webhook_and_stuck_session_captures() {
    let harness = started();

    harness.emit(json!({
        "type": "webhook.error",
        "error": "bad signature",
        "channel": "slack",
        "updateType": "event_callback"
    }));
    harness.emit(json!({
        "type": "session.stuck",
        "sessionKey": "agent:main",
        "ageMs": 180000,
        "state": "processing"
    }));

    let captures = harness.backend.captures();
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[0].message, "Webhook error: bad signature");
    assert_eq!(captures[0].level, MessageLevel::Error);
    assert_eq!(captures[0].tags["updateType"], "event_callback");
    assert_eq!(captures[1].message, "Session stuck: agent:main (180000ms)");
    assert_eq!(captures[1].level, MessageLevel::Warning);
    assert_eq!(captures[1].tags["state"], "processing");
}

#[tokio::test]
async fn test_unknown_kinds_are_ignored() {
    let harness = started();

    harness.emit(json!({ "type": "queue.lane.depth", "lane": "main", "depth": 4 }));
    harness.emit(json!({ "type": "diagnostic.heartbeat", "ts": TS }));

    assert_eq!(harness.backend.call_count(), 0);
}

#[tokio::test]
async fn test_backend_fault_does_not_stop_later_events() {
    let mut harness = Harness::new(RecordingBackend::new().fail_on_call(3));
    assert!(harness.start(BridgeConfig::new(DSN)).is_started());

    for n in 1..=5 {
        harness.emit(json!({
            "type": "session.stuck",
            "sessionKey": format!("session-{}", n),
            "ageMs": 1000,
            "state": "processing"
        }));
    }

    let keys: Vec<String> = harness
        .backend
        .captures()
        .into_iter()
        .map(|capture| capture.tags["sessionKey"].clone())
        .collect();
    assert_eq!(keys, vec!["session-1", "session-2", "session-4", "session-5"]);
    assert_eq!(harness.events.subscriber_count(), 1);
}

#[tokio::test]
async fn test_translation_fault_does_not_stop_later_events() {
    let harness = started();

    harness.emit(json!({ "type": "model.usage", "ts": TS, "model": "a" }));
    // Timestamp far outside the representable range
    harness.emit(json!({ "type": "model.usage", "ts": i64::MAX, "model": "b" }));
    harness.emit(json!({ "type": "model.usage", "ts": TS, "model": "c" }));

    let names: Vec<String> = harness.backend.spans().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["chat a", "chat c"]);
}

// ============================================================================
// Log Records
// ============================================================================

#[tokio::test]
async fn test_log_record_forwarded() {
    let harness = started();

    harness.log(json!({
        "0": "subsystem-x",
        "1": "hello",
        "_meta": { "logLevelName": "WARN", "name": "gateway" }
    }));

    let logs = harness.backend.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Warn);
    assert_eq!(logs[0].message, "hello");
    assert_eq!(logs[0].attributes["openclaw.logger"], json!("gateway"));
    assert_eq!(logs[0].attributes["openclaw.args"], json!("[\"subsystem-x\"]"));
}

#[tokio::test]
async fn test_log_without_structured_logger() {
    let mut harness = Harness::new(RecordingBackend::new().without_logs());
    assert_eq!(
        harness.start(BridgeConfig::new(DSN)),
        StartOutcome::Started { logs: true }
    );

    harness.log(json!({ "0": "dropped" }));
    assert_eq!(harness.backend.call_count(), 0);
}

#[tokio::test]
async fn test_log_faults_are_dropped() {
    let mut harness = Harness::new(RecordingBackend::new().fail_on_call(1));
    assert!(harness.start(BridgeConfig::new(DSN)).is_started());

    harness.log(json!({ "0": "rejected by backend" }));
    harness.log(json!({ "0": "kept", "_meta": { "logLevelName": "fatal" } }));

    let logs = harness.backend.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "kept");
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(harness.logs.subscriber_count(), 1);
}

#[tokio::test]
async fn test_non_object_meta_is_forwarded_with_defaults() {
    let harness = started();

    harness.log(json!({ "0": "odd meta", "_meta": "WARN" }));
    harness.log(json!({ "0": "numeric meta", "_meta": 42 }));

    let logs = harness.backend.logs();
    assert_eq!(logs.len(), 2);
    for log in &logs {
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.attributes["openclaw.logger"], json!("openclaw"));
        assert_eq!(log.timestamp, None);
    }
}

#[tokio::test]
async fn test_log_timestamp_from_meta_date() {
    let harness = started();

    harness.log(json!({
        "0": "dated",
        "_meta": { "logLevelName": "INFO", "date": "2023-11-14T22:13:20.000Z" }
    }));

    let logs = harness.backend.logs();
    assert_eq!(logs[0].timestamp.map(|ts| ts.timestamp_millis()), Some(TS));
}

#[tokio::test]
async fn test_fractional_numbers_are_accepted() {
    let harness = started();

    harness.emit(json!({
        "type": "model.usage",
        "ts": TS,
        "durationMs": 812.4,
        "model": "gpt-4o",
        "usage": { "input": 900.0 }
    }));
    harness.emit(json!({
        "type": "session.stuck",
        "sessionKey": "agent:main",
        "ageMs": 120000.5,
        "state": "processing"
    }));

    let span = &harness.backend.spans()[0];
    assert_eq!(span.duration_ms(), Some(812));
    assert_eq!(span.attributes["gen_ai.usage.input_tokens"], json!(900));

    let captures = harness.backend.captures();
    assert_eq!(captures[0].message, "Session stuck: agent:main (120000ms)");
}

// ============================================================================
// Bridge Diagnostics Output
// ============================================================================

/// Tracing layer that keeps the level and message of every event
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    fn take(&self) -> Vec<(Level, String)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageField::default();
        event.record(&mut message);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }
}

#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

/// Run `f` with a subscriber that records events into the returned capture
fn capture_tracing(f: impl FnOnce(&CapturedEvents)) -> CapturedEvents {
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());
    tracing::subscriber::with_default(subscriber, || f(&captured));
    captured
}

#[test]
fn test_missing_dsn_warns_once() {
    let captured = capture_tracing(|_| {
        let mut harness = Harness::new(RecordingBackend::new());
        assert_eq!(
            harness.start(BridgeConfig::default()),
            StartOutcome::NotConfigured
        );
    });

    let events = captured.take();
    let warnings: Vec<&(Level, String)> = events
        .iter()
        .filter(|(level, _)| *level == Level::WARN || *level == Level::ERROR)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, Level::WARN);
    assert!(warnings[0].1.contains("no DSN"));
}

#[test]
fn test_diagnostic_fault_emits_one_warning() {
    capture_tracing(|captured| {
        let mut harness = Harness::new(RecordingBackend::new().fail_on_call(1));
        assert!(harness.start(BridgeConfig::new(DSN)).is_started());
        captured.take();

        harness.emit(json!({
            "type": "webhook.error",
            "error": "bad signature",
            "channel": "slack",
            "updateType": "event_callback"
        }));
        assert_eq!(
            captured.take(),
            vec![(Level::WARN, "Failed to forward diagnostic event".to_string())]
        );

        // Translation faults take the same path
        harness.emit(json!({ "type": "model.usage", "ts": i64::MAX }));
        let events = captured.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Level::WARN);
    });
}

#[test]
fn test_log_fault_emits_no_tracing_output() {
    capture_tracing(|captured| {
        let mut harness = Harness::new(RecordingBackend::new().fail_on_call(1));
        assert!(harness.start(BridgeConfig::new(DSN)).is_started());
        captured.take();

        harness.log(json!({ "0": "rejected by backend" }));
        harness.log(json!({ "0": "accepted" }));

        assert!(captured.take().is_empty());
        assert_eq!(harness.backend.logs().len(), 1);
    });
}
