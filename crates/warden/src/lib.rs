//! # Warden
//!
//! **Pluggable authorization engine for the Themis Platform**
//!
//! Warden answers "may this caller do R to object O?" for a container and VM
//! management daemon, through one of several interchangeable drivers:
//!
//! - `tls` - restrictions carried by the caller's client certificate
//! - `rbac` - coarse permissions mirrored from a remote policy server
//! - `openfga` - a relationship engine fed with contextual tuples
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("/etc/warden/config.toml")?
//!         .with_env_prefix("WARDEN")
//!         .load()?;
//!     warden::telemetry::init_logging(&warden::log_config(&config.logging))?;
//!
//!     let collaborators = Collaborators::new()
//!         .with_certificates(certificates)
//!         .with_project_lister(projects);
//!     let authorizer = warden::bootstrap(&config, collaborators).await?;
//!
//!     let ctx = RequestContext::new(AuthenticationProtocol::Tls, fingerprint);
//!     authorizer
//!         .check_permission(&ctx, &Object::instance("default", "c1")?, Relation::CanExec)
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/warden/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod setup;

pub use setup::{bootstrap, bootstrap_with, log_config, Collaborators};

// Re-export the object model and error taxonomy
pub use warden_core as core;

// Re-export drivers and the authorizer handle
pub use warden_authz as authz;

// Re-export configuration
pub use warden_config as config;

// Re-export logging setup
pub use warden_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use warden::prelude::*;
/// ```
pub mod prelude {
    pub use warden_core::{
        AuthenticationProtocol, AuthzError, AuthzResult, Object, ObjectType, Relation,
        RequestContext,
    };

    pub use warden_authz::{
        Authorizer, CertificateCache, CertificateRecord, CertificateType, Driver, DriverRegistry,
        EntityHooks, LoadOptions, MemoryCertificateCache, PermissionChecker, ProjectLister,
        ProjectRef,
    };

    pub use warden_config::{ConfigLoader, DriverKind, WardenConfig};

    pub use crate::{bootstrap, Collaborators};
}
