//! Integration tests for the relationship adapter driver.
//!
//! The engine fake records every request so the tests can inspect the
//! contextual tuples the driver assembled.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use warden_authz::openfga::{AuthorizationModel, CheckRequest, ListObjectsRequest, Tuple};
use warden_authz::{
    Authorizer, CertificateRecord, CertificateType, DriverRegistry, EntityHooks, LoadOptions,
    MemoryCertificateCache, RebacEngine, TupleStore,
};
use warden_core::{
    AuthenticationProtocol, AuthzResult, Object, ObjectType, Relation, RequestContext,
};

#[derive(Default)]
struct FakeEngine {
    models: Mutex<Vec<AuthorizationModel>>,
    checks: Mutex<Vec<CheckRequest>>,
    lists: Mutex<Vec<ListObjectsRequest>>,
    allow: Mutex<bool>,
    listed: Mutex<Vec<String>>,
}

#[async_trait]
impl RebacEngine for FakeEngine {
    async fn write_authorization_model(&self, model: &AuthorizationModel) -> AuthzResult<String> {
        self.models.lock().push(model.clone());
        Ok("model-1".to_string())
    }

    async fn check(&self, request: &CheckRequest) -> AuthzResult<bool> {
        self.checks.lock().push(request.clone());
        Ok(*self.allow.lock())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> AuthzResult<Vec<String>> {
        self.lists.lock().push(request.clone());
        Ok(self.listed.lock().clone())
    }
}

#[derive(Default)]
struct FakeTuples {
    written: Mutex<Vec<Tuple>>,
    deleted: Mutex<Vec<Tuple>>,
}

#[async_trait]
impl TupleStore for FakeTuples {
    async fn write(&self, tuples: &[Tuple]) -> AuthzResult<()> {
        self.written.lock().extend_from_slice(tuples);
        Ok(())
    }

    async fn delete(&self, tuples: &[Tuple]) -> AuthzResult<()> {
        self.deleted.lock().extend_from_slice(tuples);
        Ok(())
    }
}

struct Fixture {
    engine: Arc<FakeEngine>,
    tuples: Arc<FakeTuples>,
    authorizer: Authorizer,
}

async fn fixture() -> Fixture {
    let engine = Arc::new(FakeEngine::default());
    let tuples = Arc::new(FakeTuples::default());
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("admin", CertificateRecord::client());
    certificates.insert(
        "fp1",
        CertificateRecord::client()
            .with_projects(["p1", "p2"])
            .with_groups(["ops"]),
    );
    certificates.insert(
        "metrics",
        CertificateRecord::new(CertificateType::Metrics).with_projects(Vec::<String>::new()),
    );

    let options = LoadOptions::new()
        .with_certificates(certificates)
        .with_rebac_engine(engine.clone())
        .with_tuple_store(tuples.clone())
        .with_config_value("openfga.store.name", "test-store");
    let authorizer = DriverRegistry::builtin()
        .load_authorizer("openfga", options)
        .await
        .unwrap();

    Fixture {
        engine,
        tuples,
        authorizer,
    }
}

fn tls(fingerprint: &str) -> RequestContext {
    RequestContext::new(AuthenticationProtocol::Tls, fingerprint)
}

#[tokio::test]
async fn test_load_registers_model() {
    let fixture = fixture().await;
    let models = fixture.engine.models.lock().clone();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].store_name, "test-store");
    assert!(models[0].dsl.contains("type instance"));
    assert!(uuid::Uuid::parse_str(&models[0].store_id).is_ok());
}

#[tokio::test]
async fn test_restricted_check_injects_memberships() {
    let fixture = fixture().await;
    *fixture.engine.allow.lock() = true;

    let c1 = Object::instance("p1", "c1").unwrap();
    fixture
        .authorizer
        .check_permission(&tls("fp1"), &c1, Relation::CanExec)
        .await
        .unwrap();

    let checks = fixture.engine.checks.lock().clone();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].tuple, Tuple::new("user:fp1", "can_exec", "instance:p1/c1"));
    assert_eq!(
        checks[0].contextual_tuples,
        vec![
            Tuple::new("user:fp1", "member", "group:ops"),
            Tuple::new("user:fp1", "operator", "project:p1"),
            Tuple::new("user:fp1", "operator", "project:p2"),
        ]
    );
}

#[tokio::test]
async fn test_denied_check_is_forbidden() {
    let fixture = fixture().await;
    let err = fixture
        .authorizer
        .check_permission(&tls("fp1"), &Object::server(), Relation::CanEdit)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_privileged_check_uses_admin_tuple() {
    let fixture = fixture().await;
    *fixture.engine.allow.lock() = true;

    fixture
        .authorizer
        .check_permission(&tls("admin"), &Object::server(), Relation::CanEdit)
        .await
        .unwrap();

    let checks = fixture.engine.checks.lock().clone();
    assert_eq!(
        checks[0].contextual_tuples,
        vec![Tuple::new("user:admin", "admin", "server:lxd")]
    );
}

#[tokio::test]
async fn test_bypasses_and_rejections() {
    let fixture = fixture().await;

    fixture
        .authorizer
        .check_permission(&RequestContext::internal(), &Object::server(), Relation::CanEdit)
        .await
        .unwrap();
    fixture
        .authorizer
        .check_permission(&tls("metrics"), &Object::server(), Relation::CanViewMetrics)
        .await
        .unwrap();
    assert!(fixture.engine.checks.lock().is_empty());

    let oidc = RequestContext::new(AuthenticationProtocol::Oidc, "alice");
    assert!(fixture
        .authorizer
        .check_permission(&oidc, &Object::server(), Relation::CanView)
        .await
        .unwrap_err()
        .is_forbidden());
    assert!(fixture
        .authorizer
        .check_permission(&tls("unknown"), &Object::server(), Relation::CanView)
        .await
        .unwrap_err()
        .is_forbidden());
}

#[tokio::test]
async fn test_list_objects_builds_checker() {
    let fixture = fixture().await;
    *fixture.engine.listed.lock() = vec![
        "instance:p1/c1".to_string(),
        "instance:p2/c9".to_string(),
        "not an object".to_string(),
    ];

    let checker = fixture
        .authorizer
        .get_permission_checker(&tls("fp1"), Relation::CanView, ObjectType::Instance)
        .await
        .unwrap();
    assert!(checker.allows(&Object::instance("p1", "c1").unwrap()));
    assert!(checker.allows(&Object::instance("p2", "c9").unwrap()));
    assert!(!checker.allows(&Object::instance("p1", "c2").unwrap()));

    let lists = fixture.engine.lists.lock().clone();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].object_type, ObjectType::Instance);
    assert_eq!(lists[0].user, "user:fp1");

    let admin = fixture
        .authorizer
        .get_permission_checker(&tls("admin"), Relation::CanView, ObjectType::Instance)
        .await
        .unwrap();
    assert!(admin.allows(&Object::instance("anywhere", "c1").unwrap()));
    assert_eq!(fixture.engine.lists.lock().len(), 1);
}

#[tokio::test]
async fn test_hooks_persist_hierarchy_only() {
    let fixture = fixture().await;
    let driver = fixture.authorizer.driver();

    driver.add_project(1, "p1").await.unwrap();
    driver.add_instance("p1", "c1").await.unwrap();
    driver.rename_instance("p1", "c1", "c2").await.unwrap();
    driver.delete_storage_pool("pool0").await.unwrap();

    let written = fixture.tuples.written.lock().clone();
    assert_eq!(
        written,
        vec![
            Tuple::new("user:*", "user", "server:lxd"),
            Tuple::new("server:lxd", "server", "project:p1"),
            Tuple::new("project:p1", "project", "instance:p1/c1"),
            Tuple::new("project:p1", "project", "instance:p1/c2"),
        ]
    );
    assert_eq!(
        fixture.tuples.deleted.lock().clone(),
        vec![
            Tuple::new("project:p1", "project", "instance:p1/c1"),
            Tuple::new("server:lxd", "server", "storage_pool:pool0"),
        ]
    );
}
