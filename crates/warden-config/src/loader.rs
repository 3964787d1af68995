//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! defaults, a TOML or JSON file, and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, DriverKind, LogFormat, WardenConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use warden_config::ConfigLoader;
///
/// # fn main() -> Result<(), warden_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()?
///     .with_file("/etc/warden/config.toml")?
///     .with_env_prefix("WARDEN")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: WardenConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WardenConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = WardenConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = WardenConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`. Sections the file
    /// omits take their default values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or does not parse (unknown fields included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &extension)?;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the named format (`toml` or
    /// `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_config::{ConfigLoader, DriverKind};
    ///
    /// let toml = r#"
    ///     [authorization]
    ///     driver = "openfga"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.authorization.driver, DriverKind::OpenFga);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`. With the
    /// prefix "WARDEN":
    /// - `WARDEN__AUTHORIZATION__DRIVER=rbac`
    /// - `WARDEN__AUTHORIZATION__RBAC__API_URL=https://rbac.example`
    /// - `WARDEN__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load variables from a `.env` file in the working directory or its
    /// parents, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if a file is found but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e.to_string())),
        }
    }

    /// Load variables from a specific `.env`-style file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref()).map_err(|e| ConfigError::Dotenv(e.to_string()))?;
        Ok(self)
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or the final
    /// configuration is invalid.
    pub fn load(mut self) -> Result<WardenConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_overrides(&prefix, env::vars())?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> WardenConfig {
        self.config
    }

    fn apply_overrides<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(path) = key.strip_prefix(&marker) {
                let parts: Vec<&str> = path.split("__").collect();
                self.apply_env_var(&key, &parts, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, parts: &[&str], value: &str) -> Result<(), ConfigError> {
        let authorization = &mut self.config.authorization;

        match parts {
            ["AUTHORIZATION", "DRIVER"] => {
                authorization.driver = value.parse::<DriverKind>().map_err(|_| {
                    ConfigError::env_parse_error(key, "expected 'tls', 'rbac' or 'openfga'")
                })?;
            }

            ["AUTHORIZATION", "RBAC", "API_URL"] => {
                authorization.rbac.api_url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["AUTHORIZATION", "RBAC", "FULL_SYNC_RETRY_SECS"] => {
                authorization.rbac.full_sync_retry_secs = parse_secs(key, value)?;
            }
            ["AUTHORIZATION", "RBAC", "CHANGE_RETRY_SECS"] => {
                authorization.rbac.change_retry_secs = parse_secs(key, value)?;
            }
            ["AUTHORIZATION", "RBAC", "REQUEST_TIMEOUT_SECS"] => {
                authorization.rbac.request_timeout_secs = parse_secs(key, value)?;
            }

            ["AUTHORIZATION", "OPENFGA", "STORE_NAME"] => {
                authorization.openfga.store_name = value.to_string();
            }

            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // Unrelated variables under the prefix belong to the embedding daemon.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<WardenConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a whole number of seconds"))
}
