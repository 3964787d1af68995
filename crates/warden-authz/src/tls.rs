//! Certificate-restriction driver.
//!
//! Decides purely from the project and group restrictions attached to the
//! caller's trusted client certificate.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use warden_core::{
    AuthenticationProtocol, AuthzError, AuthzResult, Object, ObjectType, Relation, RequestContext,
};

use crate::certificates::{CertificateCache, CertificateRecord, CertificateType};
use crate::checker::{AllowAll, PermissionChecker, ProjectChecker};
use crate::driver::{Driver, LoadOptions};
use crate::hooks::EntityHooks;

/// Outcome of the certificate rules for one caller and relation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Allow,
    Deny(String),
    /// Allowed only on objects inside these projects.
    Projects(Vec<String>),
}

const SERVER_VIEW: &[Relation] = &[
    Relation::CanView,
    Relation::CanViewResources,
    Relation::CanViewMetrics,
];

const VIEW_ONLY: &[Relation] = &[Relation::CanView];

/// Relations a restricted certificate may use on objects outside any project.
fn unscoped_relations(object_type: ObjectType) -> Option<&'static [Relation]> {
    match object_type {
        ObjectType::Server => Some(SERVER_VIEW),
        ObjectType::StoragePool | ObjectType::Certificate => Some(VIEW_ONLY),
        _ => None,
    }
}

/// The certificate-restriction driver, registered as `tls`.
#[derive(Default)]
pub struct TlsDriver {
    certificates: Option<Arc<dyn CertificateCache>>,
}

impl fmt::Debug for TlsDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsDriver")
            .field("loaded", &self.certificates.is_some())
            .finish()
    }
}

impl TlsDriver {
    /// Registry name.
    pub const NAME: &'static str = "tls";

    /// Create a driver reading from the given certificate cache.
    pub fn new(certificates: Arc<dyn CertificateCache>) -> Self {
        Self {
            certificates: Some(certificates),
        }
    }

    fn certificates(&self) -> AuthzResult<&Arc<dyn CertificateCache>> {
        self.certificates
            .as_ref()
            .ok_or_else(|| AuthzError::configuration("tls driver used before load"))
    }

    /// Run every rule that does not depend on a specific object.
    fn evaluate(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Verdict> {
        if ctx.is_internal() {
            return Ok(Verdict::Allow);
        }

        match ctx.protocol {
            None => return Ok(Verdict::Deny("caller is not authenticated".to_string())),
            Some(AuthenticationProtocol::Tls) => {}
            Some(other) => {
                warn!(
                    driver = Self::NAME,
                    protocol = %other,
                    "authentication protocol is not supported by the tls driver, allowing"
                );
                return Ok(Verdict::Allow);
            }
        }

        let Some(record) = self.certificates()?.get(&ctx.username) else {
            return Ok(Verdict::Deny(format!(
                "certificate {:?} is not trusted",
                ctx.username
            )));
        };

        Ok(restricted_verdict(&record, ctx, relation, object_type))
    }
}

fn restricted_verdict(
    record: &CertificateRecord,
    ctx: &RequestContext,
    relation: Relation,
    object_type: ObjectType,
) -> Verdict {
    if !record.is_restricted() {
        return Verdict::Allow;
    }

    if record.certificate_type == CertificateType::Metrics && relation == Relation::CanViewMetrics
    {
        return Verdict::Allow;
    }

    if ctx.all_projects {
        return Verdict::Deny(
            "restricted certificates cannot request all projects".to_string(),
        );
    }

    if let Some(allowed) = unscoped_relations(object_type) {
        return if allowed.contains(&relation) {
            Verdict::Allow
        } else {
            Verdict::Deny(format!(
                "restricted certificates cannot use {relation} on {object_type}"
            ))
        };
    }

    Verdict::Projects(record.project_names().to_vec())
}

#[async_trait]
impl EntityHooks for TlsDriver {}

#[async_trait]
impl Driver for TlsDriver {
    fn driver(&self) -> &'static str {
        Self::NAME
    }

    async fn load(&mut self, options: &LoadOptions) -> AuthzResult<()> {
        self.certificates = Some(options.require_certificates()?);
        debug!(driver = Self::NAME, "authorization driver loaded");
        Ok(())
    }

    async fn check_permission(
        &self,
        ctx: &RequestContext,
        object: &Object,
        relation: Relation,
    ) -> AuthzResult<()> {
        match self.evaluate(ctx, relation, object.object_type())? {
            Verdict::Allow => Ok(()),
            Verdict::Deny(reason) => Err(AuthzError::forbidden(reason)),
            Verdict::Projects(projects) => match object.project() {
                Some(project) if projects.iter().any(|p| p == project) => Ok(()),
                _ => Err(AuthzError::forbidden(format!(
                    "certificate is not allowed to access {object}"
                ))),
            },
        }
    }

    async fn get_permission_checker(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Box<dyn PermissionChecker>> {
        match self.evaluate(ctx, relation, object_type)? {
            Verdict::Allow => Ok(Box::new(AllowAll)),
            Verdict::Deny(reason) => {
                debug!(driver = Self::NAME, %object_type, %reason, "listing refused");
                Err(AuthzError::forbidden(reason))
            }
            Verdict::Projects(projects) => Ok(Box::new(ProjectChecker::new(projects))),
        }
    }
}
