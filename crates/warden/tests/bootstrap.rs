//! End-to-end assembly: configuration plus collaborators into a loaded driver.

use std::sync::Arc;

use async_trait::async_trait;
use warden::authz::rbac::{PermissionMap, PostOutcome, ResourcePost};
use warden::authz::RbacApi;
use warden::prelude::*;
use warden::{bootstrap, Collaborators};

/// Policy server that grants `alice` view on project 1 and never reports a
/// change.
#[derive(Debug)]
struct StaticPolicy;

#[async_trait]
impl RbacApi for StaticPolicy {
    async fn post_resources(&self, _body: &ResourcePost) -> AuthzResult<PostOutcome> {
        Ok(PostOutcome::Synced("s1".to_string()))
    }

    async fn project_permissions(&self, username: &str) -> AuthzResult<PermissionMap> {
        let mut permissions = PermissionMap::new();
        if username == "alice" {
            permissions.insert("project-1".to_string(), vec!["view".to_string()]);
        }
        Ok(permissions)
    }

    async fn server_permissions(&self, _username: &str) -> AuthzResult<PermissionMap> {
        Ok(PermissionMap::new())
    }

    async fn watch_changes(&self, _last_change: Option<&str>) -> AuthzResult<String> {
        std::future::pending().await
    }
}

struct OneProject;

#[async_trait]
impl ProjectLister for OneProject {
    async fn list_projects(&self) -> AuthzResult<Vec<ProjectRef>> {
        Ok(vec![ProjectRef::new(1, "web")])
    }
}

fn certificates() -> Arc<MemoryCertificateCache> {
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("fp1", CertificateRecord::client().with_projects(["web"]));
    certificates
}

#[tokio::test]
async fn test_default_config_loads_tls() {
    let config = ConfigLoader::new().load().unwrap();
    let authorizer = bootstrap(
        &config,
        Collaborators::new().with_certificates(certificates()),
    )
    .await
    .unwrap();
    assert_eq!(authorizer.driver_name(), "tls");

    let ctx = RequestContext::new(AuthenticationProtocol::Tls, "fp1");
    authorizer
        .check_permission(&ctx, &Object::instance("web", "c1").unwrap(), Relation::CanView)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rbac_with_injected_policy_server() {
    let config = WardenConfig::default()
        .with_driver(DriverKind::Rbac)
        .with_rbac_api_url("https://rbac.invalid");
    let collaborators = Collaborators::new()
        .with_certificates(certificates())
        .with_project_lister(Arc::new(OneProject))
        .with_rbac_api(Arc::new(StaticPolicy));

    let authorizer = bootstrap(&config, collaborators).await.unwrap();
    assert_eq!(authorizer.driver_name(), "rbac");

    // Resource posts are serialized, so once the hook returns a full sync has
    // populated the project map.
    authorizer.driver().add_project(2, "api").await.unwrap();

    let alice = RequestContext::new(AuthenticationProtocol::Oidc, "alice");
    authorizer
        .check_permission(&alice, &Object::instance("web", "c1").unwrap(), Relation::CanView)
        .await
        .unwrap();
    let err = authorizer
        .check_permission(&alice, &Object::instance("web", "c1").unwrap(), Relation::CanExec)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    authorizer.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_loading() {
    let config = WardenConfig::default().with_driver(DriverKind::Rbac);
    let err = bootstrap(&config, Collaborators::new()).await.unwrap_err();
    assert!(matches!(err, AuthzError::Configuration(_)));
    assert!(err.to_string().contains("api_url"));
}

#[tokio::test]
async fn test_missing_collaborator() {
    let config = WardenConfig::default().with_driver(DriverKind::OpenFga);
    let err = bootstrap(
        &config,
        Collaborators::new().with_certificates(certificates()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err.root(), AuthzError::Configuration(_)));
    assert!(err.to_string().contains("openfga"));
}
