//! Integration tests for the certificate-restriction driver.
//!
//! The driver is loaded through the builtin registry and exercised through the
//! `Authorizer` handle, the same way the daemon uses it.

use std::sync::Arc;

use warden_authz::{
    Authorizer, CertificateRecord, DriverRegistry, LoadOptions, MemoryCertificateCache,
};
use warden_core::{AuthenticationProtocol, Object, ObjectType, Relation, RequestContext};

async fn authorizer(certificates: Arc<MemoryCertificateCache>) -> Authorizer {
    DriverRegistry::builtin()
        .load_authorizer("tls", LoadOptions::new().with_certificates(certificates))
        .await
        .unwrap()
}

fn tls(fingerprint: &str) -> RequestContext {
    RequestContext::new(AuthenticationProtocol::Tls, fingerprint)
}

/// fp1 is restricted to `default`.
#[tokio::test]
async fn test_restricted_certificate_scenario() {
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("fp1", CertificateRecord::client().with_projects(["default"]));
    let authorizer = authorizer(certificates).await;
    assert_eq!(authorizer.driver_name(), "tls");

    let ctx = tls("fp1");
    let default_c1: Object = "instance:default/c1".parse().unwrap();
    let other_c1: Object = "instance:other/c1".parse().unwrap();
    assert!(authorizer
        .check_permission(&ctx, &default_c1, Relation::CanView)
        .await
        .is_ok());

    let err = authorizer
        .check_permission(&ctx, &other_c1, Relation::CanView)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_project_scoping() {
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("fp-a", CertificateRecord::client().with_projects(["proj-a"]));
    let authorizer = authorizer(certificates).await;
    let ctx = tls("fp-a");

    let allowed = Object::instance("proj-a", "c1").unwrap();
    let denied = Object::instance("proj-b", "c1").unwrap();
    assert!(authorizer
        .check_permission(&ctx, &allowed, Relation::CanView)
        .await
        .is_ok());
    assert!(authorizer
        .check_permission(&ctx, &denied, Relation::CanView)
        .await
        .unwrap_err()
        .is_forbidden());

    let checker = authorizer
        .get_permission_checker(&ctx, Relation::CanView, ObjectType::Instance)
        .await
        .unwrap();
    assert!(checker.allows(&allowed));
    assert!(!checker.allows(&denied));
}

#[tokio::test]
async fn test_unrestricted_certificate_is_allowed_everything() {
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("admin", CertificateRecord::client());
    let authorizer = authorizer(certificates).await;
    let ctx = tls("admin").with_all_projects(true);

    let objects = [
        Object::server(),
        Object::project_named("p1").unwrap(),
        Object::certificate("fp9").unwrap(),
        Object::storage_pool("pool0").unwrap(),
        Object::group("ops").unwrap(),
        Object::user("bob").unwrap(),
        Object::image("p1", "abc").unwrap(),
        Object::image_alias("p1", "jammy").unwrap(),
        Object::instance("p1", "c1").unwrap(),
        Object::network("p1", "br0").unwrap(),
        Object::network_acl("p1", "acl").unwrap(),
        Object::network_zone("p1", "zone").unwrap(),
        Object::profile("p1", "default").unwrap(),
        Object::storage_volume("p1", "pool0", "custom", "vol").unwrap(),
        Object::storage_bucket("p1", "pool0", "bucket").unwrap(),
    ];

    for object in &objects {
        for relation in object.object_type().relations() {
            assert!(
                authorizer
                    .check_permission(&ctx, object, *relation)
                    .await
                    .is_ok(),
                "{object} {relation}"
            );
        }
    }
}

#[tokio::test]
async fn test_invalid_relation_is_not_a_denial() {
    let certificates = Arc::new(MemoryCertificateCache::new());
    let authorizer = authorizer(certificates).await;

    let err = authorizer
        .check_permission(&tls("fp1"), &Object::storage_pool("pool0").unwrap(), Relation::CanExec)
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[tokio::test]
async fn test_listing_refusals_are_forbidden() {
    let certificates = Arc::new(MemoryCertificateCache::new());
    certificates.insert("fp1", CertificateRecord::client().with_projects(["default"]));
    let authorizer = authorizer(certificates).await;

    let err = authorizer
        .get_permission_checker(&tls("not-trusted"), Relation::CanView, ObjectType::Instance)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let restricted = tls("fp1");
    for (relation, object_type) in [
        (Relation::CanEdit, ObjectType::Server),
        (Relation::CanEdit, ObjectType::StoragePool),
        (Relation::CanEdit, ObjectType::Certificate),
    ] {
        let err = authorizer
            .get_permission_checker(&restricted, relation, object_type)
            .await
            .unwrap_err();
        assert!(err.is_forbidden(), "{relation} on {object_type}");
    }
}
