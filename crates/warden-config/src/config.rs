//! Main configuration type.

use serde::{Deserialize, Serialize};

use crate::{AuthorizationConfig, ConfigError, DriverKind, LogFormat, LoggingConfig};

/// Complete Warden configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use warden_config::{DriverKind, WardenConfig};
///
/// let config = WardenConfig::default()
///     .with_driver(DriverKind::Rbac)
///     .with_rbac_api_url("https://rbac.example");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Authorization driver selection and driver settings.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Select the authorization driver.
    #[must_use]
    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.authorization.driver = driver;
        self
    }

    /// Set the policy server URL used by the `rbac` driver.
    #[must_use]
    pub fn with_rbac_api_url(mut self, url: impl Into<String>) -> Self {
        self.authorization.rbac.api_url = Some(url.into());
        self
    }

    /// Set the store name used by the `openfga` driver.
    #[must_use]
    pub fn with_openfga_store_name(mut self, name: impl Into<String>) -> Self {
        self.authorization.openfga.store_name = name.into();
        self
    }

    /// Replace the logging section.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the `rbac` driver is selected without an `http(s)` API URL
    /// - the RBAC request timeout is zero
    /// - the `openfga` driver is selected with an empty store name
    /// - the log level is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let authorization = &self.authorization;

        if authorization.driver == DriverKind::Rbac {
            match authorization.rbac.api_url.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(ConfigError::missing_field("authorization.rbac.api_url"));
                }
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    return Err(ConfigError::invalid_value(
                        "authorization.rbac.api_url",
                        format!("expected an http(s) URL, got {url:?}"),
                    ));
                }
                Some(_) => {}
            }

            if authorization.rbac.request_timeout_secs == 0 {
                return Err(ConfigError::invalid_value(
                    "authorization.rbac.request_timeout_secs",
                    "must be greater than zero",
                ));
            }
        }

        if authorization.driver == DriverKind::OpenFga
            && authorization.openfga.store_name.trim().is_empty()
        {
            return Err(ConfigError::invalid_value(
                "authorization.openfga.store_name",
                "must not be empty",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// Local development preset: pretty debug logs, certificate driver.
    ///
    /// ```
    /// use warden_config::{LogFormat, WardenConfig};
    ///
    /// let config = WardenConfig::development();
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Production preset: JSON info logs.
    ///
    /// The driver stays at its default; production deployments select one
    /// explicitly.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}
