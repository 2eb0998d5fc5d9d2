// Telemetry Vocabulary and Logging Setup
//
// This module provides:
// - Gen-AI semantic convention attribute names for model calls
// - Host-context attribute names, span operations and tag keys used when
//   forwarding diagnostics
// - Span name helpers
// - A tracing-subscriber initialization helper for binaries and demos

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// ============================================================================
// Gen-AI Semantic Conventions
// See: https://opentelemetry.io/docs/specs/semconv/gen-ai/
// ============================================================================

/// Gen-AI semantic convention attribute names
pub mod gen_ai {
    /// The name of the operation being performed (e.g., "chat")
    pub const OPERATION_NAME: &str = "gen_ai.operation.name";
    /// The GenAI system (provider) that served the request
    pub const SYSTEM: &str = "gen_ai.system";
    /// The name of the model requested
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    /// Number of tokens in the input/prompt
    pub const USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
    /// Number of tokens in the output/completion
    pub const USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

    /// Operation names as per semantic conventions
    pub mod operation {
        pub const CHAT: &str = "chat";
    }
}

// ============================================================================
// Host Context Conventions
// ============================================================================

/// Attribute names, span operations and defaults for host context
pub mod openclaw {
    // Span attributes
    pub const CHANNEL: &str = "openclaw.channel";
    pub const SESSION_KEY: &str = "openclaw.session_key";
    pub const USAGE_CACHE_READ_TOKENS: &str = "openclaw.usage.cache_read_tokens";
    pub const USAGE_CACHE_WRITE_TOKENS: &str = "openclaw.usage.cache_write_tokens";
    pub const USAGE_TOTAL_TOKENS: &str = "openclaw.usage.total_tokens";
    pub const COST_USD: &str = "openclaw.cost_usd";
    pub const DURATION_MS: &str = "openclaw.duration_ms";
    pub const OUTCOME: &str = "openclaw.outcome";
    pub const CHAT_ID: &str = "openclaw.chat_id";
    pub const MESSAGE_ID: &str = "openclaw.message_id";

    // Structured log attributes
    pub const LOGGER: &str = "openclaw.logger";
    pub const ARGS: &str = "openclaw.args";

    /// Span operations
    pub mod op {
        pub const AI_CHAT: &str = "ai.chat";
        pub const MESSAGE: &str = "openclaw.message";
    }

    /// Message capture tag keys
    pub mod tag {
        pub const CHANNEL: &str = "channel";
        pub const SESSION_KEY: &str = "sessionKey";
        pub const UPDATE_TYPE: &str = "updateType";
        pub const STATE: &str = "state";
    }

    /// Placeholder for absent text fields
    pub const UNKNOWN: &str = "unknown";
    /// Logger name when the record does not carry one
    pub const DEFAULT_LOGGER: &str = "openclaw";
    /// Message used when a log record yields no text
    pub const DEFAULT_LOG_MESSAGE: &str = "log";
}

// ============================================================================
// Span Helpers
// ============================================================================

/// Create a span name for LLM chat operations following gen-ai conventions
///
/// Format: `{operation_name} {model_name}`
/// Example: "chat gpt-4"
pub fn chat_span_name(model: &str) -> String {
    format!("{} {}", gen_ai::operation::CHAT, model)
}

/// Create a span name for a processed message
///
/// Format: `message.{outcome}`
/// Example: "message.completed"
pub fn message_span_name(outcome: &str) -> String {
    format!("message.{}", outcome)
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Configuration for the process's own log output
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "clawtrail_observability=debug")
    pub log_filter: Option<String>,
    /// Whether to include the target module path
    pub with_target: bool,
    /// Whether to use ANSI colors
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            with_target: true,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `NO_COLOR`: Disable ANSI colors when set
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            with_target: true,
            ansi: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// Set a custom filter directive
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Install the global tracing subscriber.
///
/// Libraries never call this; it is meant for binaries and demos. Fails if a
/// global subscriber is already installed.
///
/// # Example
///
/// ```ignore
/// use clawtrail_core::telemetry::{init_telemetry, TelemetryConfig};
///
/// init_telemetry(TelemetryConfig::from_env())?;
/// ```
pub fn init_telemetry(
    config: TelemetryConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_filter(filter);

    tracing_subscriber::registry().with(console_layer).try_init()
}
