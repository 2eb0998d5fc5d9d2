// Bridge Configuration
//
// Configuration for the diagnostics bridge, loaded from the host's plugin
// config (camelCase JSON) or from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

use crate::backend::BackendOptions;

/// Environment used when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Trace sample rate used when none is configured
pub const DEFAULT_TRACES_SAMPLE_RATE: f64 = 1.0;

/// Configuration for the diagnostics bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Backend DSN. The bridge stays inert without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    /// Deployment environment reported to the backend
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Fraction of traces to keep, in `[0.0, 1.0]`
    #[serde(default = "default_traces_sample_rate")]
    pub traces_sample_rate: f64,

    /// Whether host log records are forwarded
    #[serde(default = "default_enable_logs")]
    pub enable_logs: bool,
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

fn default_traces_sample_rate() -> f64 {
    DEFAULT_TRACES_SAMPLE_RATE
}

fn default_enable_logs() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: default_environment(),
            traces_sample_rate: default_traces_sample_rate(),
            enable_logs: default_enable_logs(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with a DSN and defaults for everything else
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: Some(dsn.into()),
            ..Default::default()
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_traces_sample_rate(mut self, rate: f64) -> Self {
        self.traces_sample_rate = rate;
        self
    }

    pub fn with_enable_logs(mut self, enabled: bool) -> Self {
        self.enable_logs = enabled;
        self
    }

    /// Parse the host's plugin config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse an already-decoded plugin config
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `CLAWTRAIL_DSN`: Backend DSN (required for the bridge to start)
    /// - `CLAWTRAIL_ENVIRONMENT`: Deployment environment (default: production)
    /// - `CLAWTRAIL_TRACES_SAMPLE_RATE`: Trace sample rate (default: 1.0)
    /// - `CLAWTRAIL_ENABLE_LOGS`: Forward host logs (default: true; "false" or "0" disable)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dsn = lookup("CLAWTRAIL_DSN");

        let environment = lookup("CLAWTRAIL_ENVIRONMENT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_environment);

        let traces_sample_rate = lookup("CLAWTRAIL_TRACES_SAMPLE_RATE")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TRACES_SAMPLE_RATE);

        let enable_logs = lookup("CLAWTRAIL_ENABLE_LOGS")
            .map(|v| {
                let v = v.trim().to_lowercase();
                v != "false" && v != "0"
            })
            .unwrap_or(true);

        Self {
            dsn,
            environment,
            traces_sample_rate,
            enable_logs,
        }
    }

    /// The DSN, if one is set. Blank values count as unset.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref().map(str::trim).filter(|dsn| !dsn.is_empty())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.traces_sample_rate.is_finite()
            || !(0.0..=1.0).contains(&self.traces_sample_rate)
        {
            return Err(ConfigError::invalid(
                "tracesSampleRate",
                format!("must be between 0.0 and 1.0, got {}", self.traces_sample_rate),
            ));
        }
        Ok(())
    }

    /// Options for backend initialization, or `None` without a DSN
    pub fn backend_options(&self) -> Option<BackendOptions> {
        let dsn = self.dsn()?;
        Some(BackendOptions {
            dsn: dsn.to_string(),
            environment: self.environment.clone(),
            traces_sample_rate: self.traces_sample_rate,
            enable_logs: self.enable_logs,
        })
    }
}

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
