//! Structured logging for Warden.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either a
//! JSON (production) or pretty (development) formatter. Authorization
//! components log through plain `tracing` macros using the field names in
//! [`fields`].
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::info!(driver = "rbac", "authorization driver loaded");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. "info", "warden_authz=debug,reqwest=warn").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span close events. Useful for timing the RBAC
    /// requests, which are instrumented.
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Replace the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for an unparseable filter and
/// `TelemetryError::LoggingInit` if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` if the directive is empty or
/// invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    if filter.trim().is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "log level must not be empty".to_string(),
        ));
    }
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::InvalidConfig(format!("invalid log level: {e}")))
}

/// Field names shared by every authorization log line.
pub mod fields {
    /// Name of the active driver.
    pub const DRIVER: &str = "driver";

    /// Encoded object under evaluation.
    pub const OBJECT: &str = "object";

    /// Relation under evaluation.
    pub const RELATION: &str = "relation";

    /// Authentication protocol of the caller.
    pub const PROTOCOL: &str = "protocol";

    /// Caller identity.
    pub const USERNAME: &str = "username";

    /// Resource synchronization token.
    pub const SYNC_ID: &str = "sync_id";

    /// Error field name.
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_with_level() {
        let config = LogConfig::production().with_level("warden_authz=trace");
        assert_eq!(config.level, "warden_authz=trace");
        assert!(config.json_format);
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("warden_authz=debug,reqwest=warn").is_ok());
        assert!(matches!(
            create_env_filter("  "),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            level: String::new(),
            ..Default::default()
        };

        // Disabled logging never parses the filter.
        assert!(init_logging(&config).is_ok());
    }
}
