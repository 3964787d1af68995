//! Turning a loaded configuration into a running [`Authorizer`].

use std::fmt;
use std::sync::Arc;

use tracing::info;
use warden_authz::{
    Authorizer, CertificateCache, DriverRegistry, LoadOptions, ProjectLister, RbacApi,
    RebacEngine, TupleStore,
};
use warden_config::{LogFormat, LoggingConfig, WardenConfig};
use warden_core::{AuthzError, AuthzResult};
use warden_telemetry::LogConfig;

/// Daemon-side services the drivers depend on.
///
/// Which fields are required depends on the configured driver:
///
/// | Driver | Requires |
/// |--------|----------|
/// | `tls` | `certificates` |
/// | `rbac` | `certificates`, `project_lister` |
/// | `openfga` | `certificates`, `tuple_store`, `rebac_engine` |
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Trusted certificate cache.
    pub certificates: Option<Arc<dyn CertificateCache>>,
    /// Source of the current project list.
    pub project_lister: Option<Arc<dyn ProjectLister>>,
    /// Relationship tuple datastore.
    pub tuple_store: Option<Arc<dyn TupleStore>>,
    /// Relationship evaluation engine.
    pub rebac_engine: Option<Arc<dyn RebacEngine>>,
    /// Replaces the HTTP policy server client.
    pub rbac_api: Option<Arc<dyn RbacApi>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("certificates", &self.certificates.is_some())
            .field("project_lister", &self.project_lister.is_some())
            .field("tuple_store", &self.tuple_store.is_some())
            .field("rebac_engine", &self.rebac_engine.is_some())
            .field("rbac_api", &self.rbac_api.is_some())
            .finish()
    }
}

impl Collaborators {
    /// No collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the certificate cache.
    pub fn with_certificates(mut self, certificates: Arc<dyn CertificateCache>) -> Self {
        self.certificates = Some(certificates);
        self
    }

    /// Set the project lister.
    pub fn with_project_lister(mut self, lister: Arc<dyn ProjectLister>) -> Self {
        self.project_lister = Some(lister);
        self
    }

    /// Set the tuple datastore.
    pub fn with_tuple_store(mut self, store: Arc<dyn TupleStore>) -> Self {
        self.tuple_store = Some(store);
        self
    }

    /// Set the relationship engine.
    pub fn with_rebac_engine(mut self, engine: Arc<dyn RebacEngine>) -> Self {
        self.rebac_engine = Some(engine);
        self
    }

    /// Set the policy server client.
    pub fn with_rbac_api(mut self, api: Arc<dyn RbacApi>) -> Self {
        self.rbac_api = Some(api);
        self
    }

    fn into_load_options(self, config: &WardenConfig) -> LoadOptions {
        LoadOptions {
            config: config.authorization.driver_options(),
            project_lister: self.project_lister,
            certificates: self.certificates,
            tuple_store: self.tuple_store,
            rebac_engine: self.rebac_engine,
            rbac_api: self.rbac_api,
        }
    }
}

/// Load the configured driver from the builtin registry.
///
/// # Errors
///
/// Returns `AuthzError::Configuration` if the configuration is invalid or a
/// collaborator the driver needs is missing, and whatever the driver's load
/// fails with otherwise.
pub async fn bootstrap(
    config: &WardenConfig,
    collaborators: Collaborators,
) -> AuthzResult<Authorizer> {
    bootstrap_with(&DriverRegistry::builtin(), config, collaborators).await
}

/// Load the configured driver from `registry`.
///
/// # Errors
///
/// See [`bootstrap`].
pub async fn bootstrap_with(
    registry: &DriverRegistry,
    config: &WardenConfig,
    collaborators: Collaborators,
) -> AuthzResult<Authorizer> {
    config
        .validate()
        .map_err(|e| AuthzError::configuration(e.to_string()))?;

    let driver = config.authorization.driver;
    info!(driver = %driver, "loading authorization driver");
    warden_telemetry::describe_metrics();

    registry
        .load_authorizer(driver.as_str(), collaborators.into_load_options(config))
        .await
}

/// Translate the logging section into telemetry settings.
pub fn log_config(logging: &LoggingConfig) -> LogConfig {
    let base = match logging.format {
        LogFormat::Json => LogConfig::production(),
        LogFormat::Pretty => LogConfig::development(),
    };
    base.with_level(logging.level.clone())
}
