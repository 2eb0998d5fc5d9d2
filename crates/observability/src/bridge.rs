// Diagnostics Bridge
// Decision: The bridge owns its backend handle; nothing else initializes or flushes it
// Decision: Per-item faults stay inside the handler; the host never sees them
//
// The bridge:
// 1. Validates configuration and initializes the backend once
// 2. Subscribes to diagnostic events (faults logged as warnings)
// 3. Subscribes to host log records when enabled (faults dropped silently,
//    since logging them would feed back into the same transport)
// 4. On stop, releases both subscriptions and flushes under a time bound

use std::sync::Arc;
use std::time::Duration;

use clawtrail_core::{
    DiagnosticEvent, DiagnosticHandler, DiagnosticSource, LogHandler, LogRecord, LogSource,
    Subscription,
};
use tracing::{debug, info, warn};

use crate::backend::TelemetryBackend;
use crate::config::BridgeConfig;
use crate::translate::{forward_diagnostic, forward_log};

/// Upper bound on the shutdown flush
pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(5000);

/// What `start` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Backend initialized and subscriptions in place
    Started { logs: bool },
    /// No DSN configured; nothing was initialized
    NotConfigured,
    /// Configuration values out of range; nothing was initialized
    InvalidConfig,
    /// Backend initialization failed; nothing was subscribed
    InitFailed,
    /// The bridge was already running; nothing changed
    AlreadyStarted,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started { .. })
    }
}

/// Forwards host diagnostics and logs to a telemetry backend
pub struct DiagnosticsBridge {
    backend: Arc<dyn TelemetryBackend>,
    flush_timeout: Duration,
    initialized: bool,
    diagnostic_subscription: Option<Box<dyn Subscription>>,
    log_subscription: Option<Box<dyn Subscription>>,
}

impl DiagnosticsBridge {
    /// Create an idle bridge for a backend
    pub fn new(backend: Arc<dyn TelemetryBackend>) -> Self {
        Self {
            backend,
            flush_timeout: FLUSH_TIMEOUT,
            initialized: false,
            diagnostic_subscription: None,
            log_subscription: None,
        }
    }

    /// Override the shutdown flush bound
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Get the backend this bridge forwards to
    pub fn backend(&self) -> &Arc<dyn TelemetryBackend> {
        &self.backend
    }

    /// Whether the backend has been initialized and not yet flushed
    pub fn is_running(&self) -> bool {
        self.initialized
    }

    /// Whether host log records are currently being forwarded
    pub fn is_forwarding_logs(&self) -> bool {
        self.log_subscription.is_some()
    }

    /// Initialize the backend and subscribe to both sources.
    ///
    /// Never fails: an incomplete or invalid configuration, or a backend that
    /// refuses to initialize, leaves the bridge inert with a warning.
    pub fn start(
        &mut self,
        config: &BridgeConfig,
        events: &dyn DiagnosticSource,
        logs: &dyn LogSource,
    ) -> StartOutcome {
        if self.initialized {
            warn!(backend = self.backend.name(), "Diagnostics bridge already started");
            return StartOutcome::AlreadyStarted;
        }

        let Some(options) = config.backend_options() else {
            warn!("Diagnostics bridge not configured: no DSN set");
            return StartOutcome::NotConfigured;
        };

        if let Err(e) = config.validate() {
            warn!(error = %e, "Diagnostics bridge disabled: invalid configuration");
            return StartOutcome::InvalidConfig;
        }

        if let Err(e) = self.backend.init(&options) {
            warn!(
                backend = self.backend.name(),
                error = %e,
                "Failed to initialize telemetry backend"
            );
            return StartOutcome::InitFailed;
        }
        self.initialized = true;

        info!(
            backend = self.backend.name(),
            environment = %options.environment,
            traces_sample_rate = options.traces_sample_rate,
            "Telemetry backend initialized"
        );

        let handler = self.diagnostic_handler();
        self.diagnostic_subscription = Some(events.on_diagnostic_event(handler));
        debug!("Subscribed to diagnostic events");

        if options.enable_logs {
            let handler = self.log_handler();
            self.log_subscription = Some(logs.register_log_transport(handler));
            debug!("Registered log transport");
        }

        info!(logs = options.enable_logs, "Diagnostics bridge started");
        StartOutcome::Started {
            logs: options.enable_logs,
        }
    }

    /// Release subscriptions and flush the backend.
    ///
    /// Safe to call before `start` or more than once. Flush failures and
    /// timeouts are swallowed.
    pub async fn stop(&mut self) {
        if let Some(mut subscription) = self.diagnostic_subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(mut subscription) = self.log_subscription.take() {
            subscription.unsubscribe();
        }

        if !std::mem::take(&mut self.initialized) {
            return;
        }

        let timeout = self.flush_timeout;
        match tokio::time::timeout(timeout, self.backend.flush(timeout)).await {
            Ok(Ok(())) => debug!(backend = self.backend.name(), "Telemetry backend flushed"),
            Ok(Err(e)) => debug!(
                backend = self.backend.name(),
                error = %e,
                "Telemetry flush failed"
            ),
            Err(_) => debug!(
                backend = self.backend.name(),
                timeout_ms = timeout.as_millis() as u64,
                "Telemetry flush timed out"
            ),
        }

        info!("Diagnostics bridge stopped");
    }

    fn diagnostic_handler(&self) -> DiagnosticHandler {
        let backend = Arc::clone(&self.backend);
        Arc::new(move |event: &DiagnosticEvent| {
            if let Err(e) = forward_diagnostic(backend.as_ref(), event) {
                warn!(
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to forward diagnostic event"
                );
            }
        })
    }

    // No tracing here: this handler may be the transport tracing output ends up in.
    fn log_handler(&self) -> LogHandler {
        let backend = Arc::clone(&self.backend);
        Arc::new(move |record: &LogRecord| {
            let _ = forward_log(backend.as_ref(), record);
        })
    }
}
