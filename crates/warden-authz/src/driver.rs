//! The contract every authorization driver implements.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{AuthzError, AuthzResult, Object, ObjectType, Relation, RequestContext};

use crate::certificates::CertificateCache;
use crate::checker::PermissionChecker;
use crate::hooks::EntityHooks;
use crate::openfga::{RebacEngine, TupleStore};
use crate::rbac::RbacApi;

/// An authorization backend.
///
/// A driver is constructed with no arguments by the
/// [`DriverRegistry`](crate::DriverRegistry), then [`init`](Driver::init) and
/// [`load`](Driver::load) are called exactly once before any decision is
/// requested.
#[async_trait]
pub trait Driver: EntityHooks + fmt::Debug {
    /// The name the driver is registered under.
    fn driver(&self) -> &'static str;

    /// Prepare internal state that does not depend on options.
    async fn init(&mut self) -> AuthzResult<()> {
        Ok(())
    }

    /// Apply options and start any background work.
    async fn load(&mut self, options: &LoadOptions) -> AuthzResult<()>;

    /// Release background resources.
    async fn stop_service(&self) -> AuthzResult<()> {
        Ok(())
    }

    /// Succeeds if the caller holds `relation` on `object`.
    async fn check_permission(
        &self,
        ctx: &RequestContext,
        object: &Object,
        relation: Relation,
    ) -> AuthzResult<()>;

    /// Build a checker that filters objects of `object_type` on which the
    /// caller holds `relation`.
    async fn get_permission_checker(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Box<dyn PermissionChecker>>;
}

/// A project known to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Stable identifier.
    pub id: i64,
    /// Current name.
    pub name: String,
}

impl ProjectRef {
    /// Create a project reference.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Enumerates every existing project.
#[async_trait]
pub trait ProjectLister: Send + Sync {
    /// List all projects.
    async fn list_projects(&self) -> AuthzResult<Vec<ProjectRef>>;
}

/// Options handed to [`Driver::load`].
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Driver configuration keys (e.g. `rbac.api.url`).
    pub config: HashMap<String, String>,
    /// Source of the current project list.
    pub project_lister: Option<Arc<dyn ProjectLister>>,
    /// Trusted certificate cache.
    pub certificates: Option<Arc<dyn CertificateCache>>,
    /// Relationship tuple datastore.
    pub tuple_store: Option<Arc<dyn TupleStore>>,
    /// Relationship evaluation engine.
    pub rebac_engine: Option<Arc<dyn RebacEngine>>,
    /// Policy server client. When unset the `rbac` driver builds an HTTP
    /// client from `rbac.api.url`.
    pub rbac_api: Option<Arc<dyn RbacApi>>,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("config", &self.config)
            .field("project_lister", &self.project_lister.is_some())
            .field("certificates", &self.certificates.is_some())
            .field("tuple_store", &self.tuple_store.is_some())
            .field("rebac_engine", &self.rebac_engine.is_some())
            .field("rbac_api", &self.rbac_api)
            .finish()
    }
}

impl LoadOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration map.
    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = config;
        self
    }

    /// Set a single configuration key.
    pub fn with_config_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Set the project lister.
    pub fn with_project_lister(mut self, lister: Arc<dyn ProjectLister>) -> Self {
        self.project_lister = Some(lister);
        self
    }

    /// Set the certificate cache.
    pub fn with_certificates(mut self, certificates: Arc<dyn CertificateCache>) -> Self {
        self.certificates = Some(certificates);
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

    /// Look up a configuration value.
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Parse a configuration value, falling back to `default` when unset.
    pub fn parse_config<T: FromStr>(&self, key: &str, default: T) -> AuthzResult<T> {
        match self.config_value(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                AuthzError::configuration(format!("invalid value {raw:?} for {key}"))
            }),
        }
    }

    pub(crate) fn require_certificates(&self) -> AuthzResult<Arc<dyn CertificateCache>> {
        self.certificates
            .clone()
            .ok_or_else(|| AuthzError::configuration("a certificate cache is required"))
    }

    pub(crate) fn require_project_lister(&self) -> AuthzResult<Arc<dyn ProjectLister>> {
        self.project_lister
            .clone()
            .ok_or_else(|| AuthzError::configuration("a project lister is required"))
    }
}
