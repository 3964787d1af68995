//! Configuration schema types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which authorization driver the daemon loads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Certificate restrictions only.
    #[default]
    Tls,
    /// Remote policy server with coarse permissions.
    Rbac,
    /// Relationship-based engine.
    OpenFga,
}

impl DriverKind {
    /// Registry name of the driver.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tls => "tls",
            Self::Rbac => "rbac",
            Self::OpenFga => "openfga",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tls" => Ok(Self::Tls),
            "rbac" => Ok(Self::Rbac),
            "openfga" => Ok(Self::OpenFga),
            _ => Err(ConfigError::invalid_value(
                "authorization.driver",
                format!("unknown driver {s:?}, expected 'tls', 'rbac' or 'openfga'"),
            )),
        }
    }
}

/// Remote policy server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RbacSection {
    /// Base URL of the policy server.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Delay before retrying a failed full resource sync.
    #[serde(default = "default_full_sync_retry")]
    pub full_sync_retry_secs: u64,

    /// Delay before re-polling the change feed after an error.
    #[serde(default = "default_change_retry")]
    pub change_retry_secs: u64,

    /// Bound on every request except the change long-poll.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RbacSection {
    fn default() -> Self {
        Self {
            api_url: None,
            full_sync_retry_secs: default_full_sync_retry(),
            change_retry_secs: default_change_retry(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_full_sync_retry() -> u64 {
    60
}

fn default_change_retry() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

/// Relationship engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OpenFgaSection {
    /// Name of the store the model is registered under.
    #[serde(default = "default_store_name")]
    pub store_name: String,
}

impl Default for OpenFgaSection {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
        }
    }
}

fn default_store_name() -> String {
    "lxd".to_string()
}

/// Authorization configuration section.
///
/// # Example
///
/// ```
/// use warden_config::{AuthorizationConfig, DriverKind};
///
/// let config = AuthorizationConfig::default();
/// assert_eq!(config.driver, DriverKind::Tls);
/// assert!(config.driver_options().contains_key("rbac.sync.retry_interval"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Driver to load.
    #[serde(default)]
    pub driver: DriverKind,

    /// Settings for the `rbac` driver.
    #[serde(default)]
    pub rbac: RbacSection,

    /// Settings for the `openfga` driver.
    #[serde(default)]
    pub openfga: OpenFgaSection,
}

impl AuthorizationConfig {
    /// Flatten the sections into the string map drivers read at load.
    ///
    /// Every driver receives every key; each reads only its own.
    pub fn driver_options(&self) -> HashMap<String, String> {
        let mut options = HashMap::from([
            (
                "rbac.sync.retry_interval".to_string(),
                self.rbac.full_sync_retry_secs.to_string(),
            ),
            (
                "rbac.changes.retry_interval".to_string(),
                self.rbac.change_retry_secs.to_string(),
            ),
            (
                "rbac.request.timeout".to_string(),
                self.rbac.request_timeout_secs.to_string(),
            ),
            (
                "openfga.store.name".to_string(),
                self.openfga.store_name.clone(),
            ),
        ]);
        if let Some(url) = &self.rbac.api_url {
            options.insert("rbac.api.url".to_string(), url.clone());
        }
        options
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
