// Tracing setup for binaries and tests embedding the client

use std::sync::Once;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    EnvFilter, Registry,
};

use crate::config::ConfigError;

/// Log output settings, usually the `[telemetry]` table of a service config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directives such as `info` or `conduit_client=debug,warn`.
    /// `RUST_LOG` wins when set.
    pub level: String,

    /// One JSON object per line instead of human-readable text
    pub json: bool,

    /// Attach the `call` span opened by the `context` interceptor (method,
    /// target, request id) to every JSON line. Text output always prefixes
    /// the span.
    pub call_span: bool,

    /// Log each call span as it closes, with busy and idle time
    pub span_timing: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            call_span: true,
            span_timing: false,
        }
    }
}

impl TelemetryConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_timing {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber; fails if one is already installed
pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let subscriber = Registry::default().with(env_filter);

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(config.span_events())
            .with_current_span(config.call_span)
            .with_span_list(false);
        tracing::subscriber::set_global_default(subscriber.with(json_layer))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(config.span_events())
            .with_target(true);
        tracing::subscriber::set_global_default(subscriber.with(fmt_layer))?;
    }

    Ok(())
}

static TEST_INIT: Once = Once::new();

/// Debug-level text tracing for tests, installed at most once per process
pub fn init_test_tracing() {
    TEST_INIT.call_once(|| {
        let config = TelemetryConfig {
            level: "debug".to_string(),
            span_timing: true,
            ..TelemetryConfig::default()
        };
        let _ = init_tracing(&config);
    });
}
