//! Wire-level tests of the HTTP client for the remote policy server.

use std::time::Duration;

use mockito::{Matcher, Server};
use warden_authz::rbac::{PostOutcome, ResourcePost, ResourceUpdate};
use warden_authz::{HttpRbacApi, RbacApi};
use warden_core::AuthzError;

fn api(server: &Server) -> HttpRbacApi {
    HttpRbacApi::new(server.url(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_post_resources() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/service/v1/resources/project")
        .match_body(Matcher::Json(serde_json::json!({
            "last-sync-id": "s1",
            "updates": [{"identifier": "3", "name": "p3"}],
            "removals": [],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"sync-id": "s2"}"#)
        .expect(1)
        .create_async()
        .await;

    let body = ResourcePost {
        last_sync_id: Some("s1".to_string()),
        updates: vec![ResourceUpdate {
            identifier: "3".to_string(),
            name: "p3".to_string(),
        }],
        removals: Vec::new(),
    };
    let outcome = api(&server).post_resources(&body).await.unwrap();
    assert_eq!(outcome, PostOutcome::Synced("s2".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_conflict_and_failure() {
    let mut server = Server::new_async().await;
    let conflict = server
        .mock("POST", "/api/service/v1/resources/project")
        .with_status(409)
        .expect(1)
        .create_async()
        .await;

    let outcome = api(&server)
        .post_resources(&ResourcePost::default())
        .await
        .unwrap();
    assert_eq!(outcome, PostOutcome::Conflict);
    conflict.assert_async().await;
    conflict.remove_async().await;

    server
        .mock("POST", "/api/service/v1/resources/project")
        .with_status(500)
        .create_async()
        .await;
    let err = api(&server)
        .post_resources(&ResourcePost::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::RemoteStatus { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_permission_fetches() {
    let mut server = Server::new_async().await;
    let projects = server
        .mock("GET", "/api/service/v1/resources/project/permissions-for-user")
        .match_query(Matcher::UrlEncoded("u".into(), "alice".into()))
        .with_status(200)
        .with_body(r#"{"project-1": ["view", "manage-containers"]}"#)
        .expect(1)
        .create_async()
        .await;
    let admin = server
        .mock("GET", "/api/service/v1/resources/lxd/permissions-for-user")
        .match_query(Matcher::UrlEncoded("u".into(), "alice".into()))
        .with_status(200)
        .with_body(r#"{"": ["admin"]}"#)
        .expect(1)
        .create_async()
        .await;

    let api = api(&server);
    let permissions = api.project_permissions("alice").await.unwrap();
    assert_eq!(permissions["project-1"], vec!["view", "manage-containers"]);
    let server_permissions = api.server_permissions("alice").await.unwrap();
    assert_eq!(server_permissions[""], vec!["admin"]);

    projects.assert_async().await;
    admin.assert_async().await;
}

#[tokio::test]
async fn test_watch_changes() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/api/service/v1/changes")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"last-change": "c1"}"#)
        .create_async()
        .await;
    let next = server
        .mock("GET", "/api/service/v1/changes")
        .match_query(Matcher::UrlEncoded("last-change".into(), "c1".into()))
        .with_status(504)
        .create_async()
        .await;

    let api = api(&server);
    assert_eq!(api.watch_changes(None).await.unwrap(), "c1");
    let err = api.watch_changes(Some("c1")).await.unwrap_err();
    assert!(matches!(err, AuthzError::RemoteStatus { status: 504, .. }));

    first.assert_async().await;
    next.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_server() {
    let api = HttpRbacApi::new("http://127.0.0.1:9", Duration::from_secs(1));
    let err = api.project_permissions("alice").await.unwrap_err();
    assert!(matches!(err, AuthzError::RemoteUnavailable(_)));
}
