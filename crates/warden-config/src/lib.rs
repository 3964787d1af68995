//! Typed configuration for Warden.
//!
//! Configuration is layered: built-in defaults, then a TOML or JSON file,
//! then environment variables. The authorization section selects a driver and
//! carries each driver's settings; [`AuthorizationConfig::driver_options`]
//! flattens it into the string map drivers read at load.
//!
//! # Example
//!
//! ```toml
//! [authorization]
//! driver = "rbac"
//!
//! [authorization.rbac]
//! api_url = "https://rbac.example"
//! full_sync_retry_secs = 60
//! change_retry_secs = 5
//! request_timeout_secs = 30
//!
//! [authorization.openfga]
//! store_name = "lxd"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variables
//!
//! Override any value with `WARDEN__SECTION__KEY`:
//! - `WARDEN__AUTHORIZATION__DRIVER=openfga`
//! - `WARDEN__AUTHORIZATION__RBAC__API_URL=https://rbac.example`
//! - `WARDEN__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::WardenConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    AuthorizationConfig, DriverKind, LogFormat, LoggingConfig, OpenFgaSection, RbacSection,
};
