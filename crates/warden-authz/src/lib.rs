//! Warden Authorization - pluggable authorization drivers.
//!
//! This crate answers "does this caller hold relation R on object O?" and,
//! for list operations, "which objects of type T does this caller hold R on?"
//! through one of several interchangeable drivers.
//!
//! # Overview
//!
//! - [`TlsDriver`] decides from the restrictions on the caller's client
//!   certificate
//! - [`RbacDriver`] mirrors permissions from a remote policy server, keeping a
//!   project resource map and a per-user permission cache in sync
//! - [`OpenFgaDriver`] asks an external relationship engine, injecting group
//!   and project memberships as contextual tuples
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//!                      │   DriverRegistry           │
//!                      │   (name -> constructor)    │
//!                      └──────────┬─────────────────┘
//!                                 │ init + load(LoadOptions)
//!                      ┌──────────▼─────────────────┐
//!    RequestContext    │   Authorizer               │
//!          │           │   (Arc<dyn Driver>)        │
//!          ▼           └──────────┬─────────────────┘
//!     ┌────────────┐              │ check_permission /
//!     │   Daemon   │──────────────▼ get_permission_checker
//!     │  handlers  │   allow / Forbidden / PermissionChecker
//!     └────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_authz::{CertificateRecord, DriverRegistry, LoadOptions, MemoryCertificateCache};
//! use warden_core::{AuthenticationProtocol, Object, Relation, RequestContext};
//!
//! # tokio_test::block_on(async {
//! let certificates = Arc::new(MemoryCertificateCache::new());
//! certificates.insert("fp1", CertificateRecord::client().with_projects(["default"]));
//!
//! let authorizer = DriverRegistry::builtin()
//!     .load_authorizer("tls", LoadOptions::new().with_certificates(certificates))
//!     .await
//!     .unwrap();
//!
//! let ctx = RequestContext::new(AuthenticationProtocol::Tls, "fp1");
//! let object = Object::instance("default", "c1").unwrap();
//! assert!(authorizer.check_permission(&ctx, &object, Relation::CanView).await.is_ok());
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod certificates;
pub mod checker;
pub mod driver;
pub mod hooks;
pub mod openfga;
pub mod rbac;
pub mod registry;
pub mod tls;

use std::sync::Arc;

use tracing::error;
use warden_core::{AuthzError, AuthzResult, Object, ObjectType, Relation, RequestContext};

// Re-exports for convenience
pub use certificates::{
    CertificateCache, CertificateRecord, CertificateType, MemoryCertificateCache,
};
pub use checker::{AllowAll, DenyAll, ObjectSetChecker, PermissionChecker, ProjectChecker};
pub use driver::{Driver, LoadOptions, ProjectLister, ProjectRef};
pub use hooks::EntityHooks;
pub use openfga::{OpenFgaDriver, RebacEngine, TupleStore};
pub use rbac::{HttpRbacApi, RbacApi, RbacDriver, RbacStatus, SyncState};
pub use registry::{DriverConstructor, DriverRegistry};
pub use tls::TlsDriver;

/// Message returned to callers for every failure that is not a clean denial.
const OPAQUE_DENIAL: &str = "not authorized";

/// Handle to the single active driver.
///
/// Validates relations before asking the driver and never leaks internal
/// failure details to the caller.
#[derive(Debug, Clone)]
pub struct Authorizer {
    /// Active driver.
    driver: Arc<dyn Driver>,
}

impl Authorizer {
    /// Wrap a loaded driver.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Name of the active driver.
    pub fn driver_name(&self) -> &'static str {
        self.driver.driver()
    }

    /// The active driver, for entity hooks.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Succeeds if the caller holds `relation` on `object`.
    ///
    /// Returns `InvalidArgument` if the object type does not declare the
    /// relation, and `Forbidden` for everything else.
    pub async fn check_permission(
        &self,
        ctx: &RequestContext,
        object: &Object,
        relation: Relation,
    ) -> AuthzResult<()> {
        object.object_type().validate_relation(relation)?;

        self.driver
            .check_permission(ctx, object, relation)
            .await
            .map_err(|err| {
                if err.is_forbidden() {
                    return err;
                }
                error!(
                    driver = self.driver_name(),
                    object = %object,
                    relation = %relation,
                    protocol = ctx.protocol_name(),
                    error = %err,
                    "authorization check failed"
                );
                AuthzError::forbidden(OPAQUE_DENIAL)
            })
    }

    /// Build a checker for filtering objects of `object_type`.
    pub async fn get_permission_checker(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Box<dyn PermissionChecker>> {
        object_type.validate_relation(relation)?;

        self.driver
            .get_permission_checker(ctx, relation, object_type)
            .await
            .map_err(|err| {
                if err.is_forbidden() {
                    return err;
                }
                error!(
                    driver = self.driver_name(),
                    object_type = %object_type,
                    relation = %relation,
                    protocol = ctx.protocol_name(),
                    error = %err,
                    "failed to build permission checker"
                );
                AuthzError::forbidden(OPAQUE_DENIAL)
            })
    }

    /// Stop the driver's background work.
    pub async fn stop(&self) -> AuthzResult<()> {
        self.driver.stop_service().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_core::AuthenticationProtocol;

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl EntityHooks for Failing {}

    #[async_trait]
    impl Driver for Failing {
        fn driver(&self) -> &'static str {
            "failing"
        }

        async fn load(&mut self, _options: &LoadOptions) -> AuthzResult<()> {
            Ok(())
        }

        async fn check_permission(
            &self,
            _ctx: &RequestContext,
            object: &Object,
            _relation: Relation,
        ) -> AuthzResult<()> {
            if object.object_type() == ObjectType::Server {
                Err(AuthzError::forbidden("server is off limits"))
            } else {
                Err(AuthzError::RemoteUnavailable("connection refused".to_string())
                    .context("failed to sync user permissions"))
            }
        }

        async fn get_permission_checker(
            &self,
            _ctx: &RequestContext,
            _relation: Relation,
            _object_type: ObjectType,
        ) -> AuthzResult<Box<dyn PermissionChecker>> {
            Err(AuthzError::mapping_gap("instance", "can_view"))
        }
    }

    fn authorizer() -> Authorizer {
        Authorizer::new(Arc::new(Failing))
    }

    fn ctx() -> RequestContext {
        RequestContext::new(AuthenticationProtocol::Candid, "alice")
    }

    #[tokio::test]
    async fn test_invalid_relation_is_rejected_before_driver() {
        let err = authorizer()
            .check_permission(&ctx(), &Object::server(), Relation::CanExec)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_clean_denial_passes_through() {
        let err = authorizer()
            .check_permission(&ctx(), &Object::server(), Relation::CanView)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "forbidden: server is off limits");
    }

    #[tokio::test]
    async fn test_internal_failures_are_opaque() {
        let object = Object::instance("default", "c1").unwrap();
        let err = authorizer()
            .check_permission(&ctx(), &object, Relation::CanView)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "forbidden: not authorized");

        let err = authorizer()
            .get_permission_checker(&ctx(), Relation::CanView, ObjectType::Instance)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        assert!(!err.to_string().contains("mapping"));
    }

    #[test]
    fn test_driver_name() {
        assert_eq!(authorizer().driver_name(), "failing");
    }
}
