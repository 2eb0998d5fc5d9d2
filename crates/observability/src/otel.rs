// OpenTelemetry Backend
//
// Exports spans and log records over OTLP/HTTP. The DSN is the collector base
// URL; traces go to `{dsn}/v1/traces` and logs to `{dsn}/v1/logs`.
//
// Message captures have no OpenTelemetry counterpart of their own, so they
// are emitted as log records at warn/error severity with their tags as
// attributes. They are exported even when structured logs are disabled.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clawtrail_core::LogLevel;
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity};
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use serde_json::Value;
use tracing::debug;

use crate::backend::{
    Attributes, BackendError, BackendOptions, MessageLevel, SpanHandle, SpanStatus, StatusCode,
    StructuredLogger, Tags, TelemetryBackend,
};

/// Service name reported in the resource
pub const SERVICE_NAME: &str = "openclaw";

/// Instrumentation scope for tracers and loggers
const SCOPE: &str = "clawtrail";

struct OtelState {
    tracer_provider: SdkTracerProvider,
    tracer: SdkTracer,
    logger_provider: SdkLoggerProvider,
    logger: SdkLogger,
    enable_logs: bool,
    /// Set by flush; a later init retires this state
    flushed: bool,
}

impl OtelState {
    fn build(options: &BackendOptions) -> Result<Self, BackendError> {
        let base = options.dsn.trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(BackendError::Config(format!(
                "DSN must be an http(s) collector URL, got {}",
                options.dsn
            )));
        }

        let resource = Resource::builder()
            .with_attributes(vec![
                KeyValue::new("service.name", SERVICE_NAME),
                KeyValue::new("deployment.environment", options.environment.clone()),
            ])
            .build();

        let span_exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(format!("{}/v1/traces", base))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_sampler(Sampler::TraceIdRatioBased(options.traces_sample_rate))
            .with_resource(resource.clone())
            .build();

        let log_exporter = LogExporter::builder()
            .with_http()
            .with_endpoint(format!("{}/v1/logs", base))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        let logger_provider = SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build();

        debug!(endpoint = %base, "OTLP exporters configured");
        Ok(Self {
            tracer: tracer_provider.tracer(SCOPE),
            logger: logger_provider.logger(SCOPE),
            tracer_provider,
            logger_provider,
            enable_logs: options.enable_logs,
            flushed: false,
        })
    }

    fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            debug!(error = %e, "Tracer provider shutdown failed");
        }
        if let Err(e) = self.logger_provider.shutdown() {
            debug!(error = %e, "Logger provider shutdown failed");
        }
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
        attributes: &Attributes,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let (severity, severity_text) = severity(level);
        let now = SystemTime::now();

        let mut record = self.logger.create_log_record();
        record.set_timestamp(timestamp.map(SystemTime::from).unwrap_or(now));
        record.set_observed_timestamp(now);
        record.set_severity_number(severity);
        record.set_severity_text(severity_text);
        record.set_body(AnyValue::from(message.to_string()));
        for (key, value) in attributes {
            record.add_attribute(key.clone(), to_any_value(value));
        }

        self.logger.emit(record);
    }
}

/// Telemetry backend exporting to an OTLP/HTTP collector.
///
/// Initializes once per flush: after `flush` the next `init` shuts the old
/// providers down and replaces them, so a stopped bridge can start again.
#[derive(Default)]
pub struct OtelBackend {
    state: RwLock<Option<OtelState>>,
}

impl OtelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<OtelState>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<OtelState>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TelemetryBackend for OtelBackend {
    fn name(&self) -> &'static str {
        "otel"
    }

    fn init(&self, options: &BackendOptions) -> Result<(), BackendError> {
        let mut slot = self.write();
        if slot.as_ref().is_some_and(|state| !state.flushed) {
            return Err(BackendError::AlreadyInitialized);
        }

        let state = OtelState::build(options)?;
        if let Some(previous) = slot.replace(state) {
            previous.shutdown();
            debug!("Replaced flushed OTLP providers");
        }
        Ok(())
    }

    fn start_span(
        &self,
        op: &str,
        name: &str,
        start_time: DateTime<Utc>,
        attributes: &Attributes,
    ) -> Result<Option<Box<dyn SpanHandle>>, BackendError> {
        let slot = self.read();
        let state = slot.as_ref().ok_or(BackendError::NotInitialized)?;

        let mut key_values: Vec<KeyValue> = attributes
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), to_otel_value(value)))
            .collect();
        key_values.push(KeyValue::new("openclaw.op", op.to_string()));

        let span = state
            .tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Internal)
            .with_start_time(SystemTime::from(start_time))
            .with_attributes(key_values)
            .start(&state.tracer);

        if !span.is_recording() {
            return Ok(None);
        }
        Ok(Some(Box::new(OtelSpan { span })))
    }

    fn capture_message(
        &self,
        message: &str,
        level: MessageLevel,
        tags: &Tags,
    ) -> Result<(), BackendError> {
        let slot = self.read();
        let state = slot.as_ref().ok_or(BackendError::NotInitialized)?;
        let level = match level {
            MessageLevel::Warning => LogLevel::Warn,
            MessageLevel::Error => LogLevel::Error,
        };
        let attributes: Attributes = tags
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        state.emit(level, message, &attributes, None);
        Ok(())
    }

    fn structured_logger(&self) -> Option<&dyn StructuredLogger> {
        let enabled = self.read().as_ref().is_some_and(|state| state.enable_logs);
        enabled.then_some(self as &dyn StructuredLogger)
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BackendError> {
        let (tracer_provider, logger_provider) = {
            let mut slot = self.write();
            let state = slot.as_mut().ok_or(BackendError::NotInitialized)?;
            state.flushed = true;
            (state.tracer_provider.clone(), state.logger_provider.clone())
        };

        // force_flush blocks until the exporters finish
        let task = tokio::task::spawn_blocking(move || {
            let traces = tracer_provider.force_flush();
            let logs = logger_provider.force_flush();
            traces
                .and(logs)
                .map_err(|e| BackendError::Export(e.to_string()))
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(BackendError::Export(e.to_string())),
            Err(_) => Err(BackendError::Export(format!(
                "flush timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

impl StructuredLogger for OtelBackend {
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
        let slot = self.read();
        let state = slot.as_ref().ok_or(BackendError::NotInitialized)?;
        state.emit(level, message, attributes, timestamp);
        Ok(())
    }
}

// ============================================================================
// Span Handle
// ============================================================================

struct OtelSpan {
    span: opentelemetry_sdk::trace::Span,
}

impl SpanHandle for OtelSpan {
    fn set_status(&mut self, status: &SpanStatus) {
        let status = match status.code {
            StatusCode::Ok => Status::Ok,
            StatusCode::InternalError => Status::error(status.message.clone().unwrap_or_default()),
        };
        self.span.set_status(status);
    }

    fn end(mut self: Box<Self>, end_time: DateTime<Utc>) {
        self.span.end_with_timestamp(SystemTime::from(end_time));
    }
}

fn severity(level: LogLevel) -> (Severity, &'static str) {
    match level {
        LogLevel::Debug => (Severity::Debug, "DEBUG"),
        LogLevel::Info => (Severity::Info, "INFO"),
        LogLevel::Warn => (Severity::Warn, "WARN"),
        LogLevel::Error => (Severity::Error, "ERROR"),
    }
}

// ============================================================================
// Value Conversion
// ============================================================================

fn to_otel_value(value: &Value) -> opentelemetry::Value {
    match value {
        Value::Bool(b) => opentelemetry::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                opentelemetry::Value::I64(i)
            } else {
                opentelemetry::Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => opentelemetry::Value::String(s.clone().into()),
        other => opentelemetry::Value::String(other.to_string().into()),
    }
}

fn to_any_value(value: &Value) -> AnyValue {
    match value {
        Value::Bool(b) => AnyValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AnyValue::Int(i)
            } else {
                AnyValue::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => AnyValue::from(s.clone()),
        other => AnyValue::from(other.to_string()),
    }
}
