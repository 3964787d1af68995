//! Relationship-based adapter driver.
//!
//! Translates each decision into a Check or ListObjects call against an
//! external relationship engine. Group memberships and project operator roles
//! come from the caller's certificate and are injected as contextual tuples on
//! every call; only the entity hierarchy is persisted.

pub mod engine;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::{
    AuthenticationProtocol, AuthzError, AuthzResult, Object, ObjectType, Relation, RequestContext,
};

pub use engine::{
    AuthorizationModel, CheckRequest, ListObjectsRequest, RebacEngine, Tuple, TupleStore,
};

use crate::certificates::{CertificateCache, CertificateRecord, CertificateType};
use crate::checker::{AllowAll, ObjectSetChecker, PermissionChecker};
use crate::driver::{Driver, LoadOptions};
use crate::hooks::EntityHooks;

/// Relation schema registered with the engine at load.
pub const AUTHORIZATION_MODEL: &str = include_str!("model.fga");

/// Configuration key of the store name.
pub const STORE_NAME_KEY: &str = "openfga.store.name";

const DEFAULT_STORE_NAME: &str = "lxd";

/// Who the engine is asked about.
enum Subject {
    /// Decided without the engine.
    Allow,
    Caller {
        user: String,
        privileged: bool,
        contextual_tuples: Vec<Tuple>,
    },
}

/// The relationship adapter driver, registered as `openfga`.
#[derive(Default)]
pub struct OpenFgaDriver {
    engine: Option<Arc<dyn RebacEngine>>,
    tuples: Option<Arc<dyn TupleStore>>,
    certificates: Option<Arc<dyn CertificateCache>>,
    store_id: String,
    model_id: Option<String>,
}

impl fmt::Debug for OpenFgaDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFgaDriver")
            .field("store_id", &self.store_id)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl OpenFgaDriver {
    /// Registry name.
    pub const NAME: &'static str = "openfga";

    /// Identifier of the store generated at load.
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Identifier of the registered model.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    fn engine(&self) -> AuthzResult<&Arc<dyn RebacEngine>> {
        self.engine
            .as_ref()
            .ok_or_else(|| AuthzError::configuration("openfga driver used before load"))
    }

    fn tuple_store(&self) -> AuthzResult<&Arc<dyn TupleStore>> {
        self.tuples
            .as_ref()
            .ok_or_else(|| AuthzError::configuration("openfga driver used before load"))
    }

    fn subject(&self, ctx: &RequestContext, relation: Relation) -> AuthzResult<Subject> {
        if ctx.is_internal() {
            return Ok(Subject::Allow);
        }

        if ctx.protocol != Some(AuthenticationProtocol::Tls) {
            return Err(AuthzError::forbidden(format!(
                "authentication protocol {:?} is not supported by the openfga driver",
                ctx.protocol_name()
            )));
        }

        let certificates = self
            .certificates
            .as_ref()
            .ok_or_else(|| AuthzError::configuration("openfga driver used before load"))?;
        let Some(record) = certificates.get(&ctx.username) else {
            return Err(AuthzError::forbidden(format!(
                "certificate {:?} is not trusted",
                ctx.username
            )));
        };

        if record.certificate_type == CertificateType::Metrics
            && relation == Relation::CanViewMetrics
        {
            return Ok(Subject::Allow);
        }

        let user = Object::user(&ctx.username)?;
        let privileged = !record.is_restricted();
        let contextual_tuples = contextual_tuples(&user, &record, privileged)?;
        Ok(Subject::Caller {
            user: user.to_string(),
            privileged,
            contextual_tuples,
        })
    }
}

/// Tuples describing the caller's memberships for one request.
fn contextual_tuples(
    user: &Object,
    record: &CertificateRecord,
    privileged: bool,
) -> AuthzResult<Vec<Tuple>> {
    if privileged {
        return Ok(vec![Tuple::relation(user, Relation::Admin, &Object::server())]);
    }

    let mut tuples = Vec::with_capacity(record.group_names().len() + record.project_names().len());
    for group in record.group_names() {
        tuples.push(Tuple::relation(user, Relation::Member, &Object::group(group)?));
    }
    for project in record.project_names() {
        tuples.push(Tuple::relation(user, Relation::Operator, &Object::project_named(project)?));
    }
    Ok(tuples)
}

/// Persisted tuples placing `object` in the entity hierarchy.
fn hierarchy_tuples(object: &Object) -> AuthzResult<Vec<Tuple>> {
    let tuple = match object.object_type() {
        ObjectType::Server | ObjectType::Group | ObjectType::User => return Ok(Vec::new()),
        ObjectType::Project | ObjectType::StoragePool | ObjectType::Certificate => {
            Tuple::parent(&Object::server(), "server", object)
        }
        _ => {
            let project = object
                .project()
                .ok_or_else(|| AuthzError::invalid_argument(format!("{object} has no project")))?;
            Tuple::parent(&Object::project_named(project)?, "project", object)
        }
    };
    Ok(vec![tuple])
}

#[async_trait]
impl EntityHooks for OpenFgaDriver {
    async fn object_added(&self, object: &Object) -> AuthzResult<()> {
        let tuples = hierarchy_tuples(object)?;
        if tuples.is_empty() {
            return Ok(());
        }
        self.tuple_store()?.write(&tuples).await
    }

    async fn object_removed(&self, object: &Object) -> AuthzResult<()> {
        let tuples = hierarchy_tuples(object)?;
        if tuples.is_empty() {
            return Ok(());
        }
        self.tuple_store()?.delete(&tuples).await
    }

    async fn object_renamed(&self, old: &Object, new: &Object) -> AuthzResult<()> {
        self.object_removed(old).await?;
        self.object_added(new).await
    }
}

#[async_trait]
impl Driver for OpenFgaDriver {
    fn driver(&self) -> &'static str {
        Self::NAME
    }

    async fn load(&mut self, options: &LoadOptions) -> AuthzResult<()> {
        let engine = options
            .rebac_engine
            .clone()
            .ok_or_else(|| AuthzError::configuration("a relationship engine is required"))?;
        let tuples = options
            .tuple_store
            .clone()
            .ok_or_else(|| AuthzError::configuration("a tuple datastore is required"))?;
        let certificates = options.require_certificates()?;

        let store_name = options
            .config_value(STORE_NAME_KEY)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_STORE_NAME)
            .to_string();
        let store_id = Uuid::now_v7().to_string();

        let model = AuthorizationModel {
            store_id: store_id.clone(),
            store_name: store_name.clone(),
            dsl: AUTHORIZATION_MODEL.to_string(),
        };
        let model_id = engine
            .write_authorization_model(&model)
            .await
            .map_err(|e| e.context("failed to write authorization model"))?;

        // Every authenticated identity may view the server.
        let everyone = Tuple::new("user:*", Relation::User.as_str(), Object::server().to_string());
        tuples.write(&[everyone]).await?;

        info!(
            driver = Self::NAME,
            store = %store_name,
            store_id = %store_id,
            model_id = %model_id,
            "authorization model registered"
        );

        self.engine = Some(engine);
        self.tuples = Some(tuples);
        self.certificates = Some(certificates);
        self.store_id = store_id;
        self.model_id = Some(model_id);
        Ok(())
    }

    async fn check_permission(
        &self,
        ctx: &RequestContext,
        object: &Object,
        relation: Relation,
    ) -> AuthzResult<()> {
        let Subject::Caller {
            user,
            contextual_tuples,
            ..
        } = self.subject(ctx, relation)?
        else {
            return Ok(());
        };

        let request = CheckRequest {
            store_id: self.store_id.clone(),
            tuple: Tuple::new(user, relation.as_str(), object.to_string()),
            contextual_tuples,
        };
        let allowed = self.engine()?.check(&request).await?;
        debug!(driver = Self::NAME, tuple = %request.tuple, allowed, "relationship check");

        if allowed {
            Ok(())
        } else {
            Err(AuthzError::forbidden(format!(
                "{} does not hold {relation} on {object}",
                request.tuple.user
            )))
        }
    }

    async fn get_permission_checker(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Box<dyn PermissionChecker>> {
        let (user, contextual_tuples) = match self.subject(ctx, relation)? {
            Subject::Allow | Subject::Caller { privileged: true, .. } => {
                return Ok(Box::new(AllowAll))
            }
            Subject::Caller {
                user,
                contextual_tuples,
                ..
            } => (user, contextual_tuples),
        };

        let request = ListObjectsRequest {
            store_id: self.store_id.clone(),
            object_type,
            relation,
            user,
            contextual_tuples,
        };
        let listed = self.engine()?.list_objects(&request).await?;

        let objects = listed.into_iter().filter_map(|raw| match Object::parse(&raw) {
            Ok(object) => Some(object),
            Err(err) => {
                warn!(
                    driver = Self::NAME,
                    object = %raw,
                    error = %err,
                    "skipping unparseable object"
                );
                None
            }
        });
        Ok(Box::new(ObjectSetChecker::new(objects)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_declares_every_object_type() {
        for object_type in ObjectType::ALL {
            let header = format!("type {object_type}\n");
            assert!(AUTHORIZATION_MODEL.contains(&header), "{object_type}");
        }
    }

    #[test]
    fn test_contextual_tuples() {
        let user = Object::user("fp1").unwrap();
        let record = CertificateRecord::client()
            .with_projects(["p1"])
            .with_groups(["ops"]);

        let tuples = contextual_tuples(&user, &record, false).unwrap();
        assert_eq!(
            tuples,
            vec![
                Tuple::new("user:fp1", "member", "group:ops"),
                Tuple::new("user:fp1", "operator", "project:p1"),
            ]
        );

        let admin = contextual_tuples(&user, &CertificateRecord::client(), true).unwrap();
        assert_eq!(admin, vec![Tuple::new("user:fp1", "admin", "server:lxd")]);
    }

    #[test]
    fn test_hierarchy_tuples() {
        let instance = Object::instance("p1", "c1").unwrap();
        assert_eq!(
            hierarchy_tuples(&instance).unwrap(),
            vec![Tuple::new("project:p1", "project", "instance:p1/c1")]
        );
        assert_eq!(
            hierarchy_tuples(&Object::project_named("p1").unwrap()).unwrap(),
            vec![Tuple::new("server:lxd", "server", "project:p1")]
        );
        assert!(hierarchy_tuples(&Object::server()).unwrap().is_empty());
    }
}
