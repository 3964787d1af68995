//! Wire protocol of the remote policy server.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use warden_core::{AuthzError, AuthzResult};

const RESOURCES_PATH: &str = "/api/service/v1/resources/project";
const PROJECT_PERMISSIONS_PATH: &str = "/api/service/v1/resources/project/permissions-for-user";
const SERVER_PERMISSIONS_PATH: &str = "/api/service/v1/resources/lxd/permissions-for-user";
const CHANGES_PATH: &str = "/api/service/v1/changes";

/// Permissions keyed by remote resource identifier.
pub type PermissionMap = HashMap<String, Vec<String>>;

/// One project resource as known to the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// Remote identifier.
    pub identifier: String,
    /// Project name.
    pub name: String,
}

/// Body of a resource delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePost {
    /// Token from the previous successful post, `null` on a full sync.
    #[serde(rename = "last-sync-id")]
    pub last_sync_id: Option<String>,
    /// Added or renamed resources.
    pub updates: Vec<ResourceUpdate>,
    /// Identifiers of removed resources.
    pub removals: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResourcePostResponse {
    #[serde(rename = "sync-id")]
    sync_id: String,
}

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    #[serde(rename = "last-change")]
    last_change: String,
}

/// Result of posting a resource delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Accepted; carries the new sync token.
    Synced(String),
    /// The token was stale and a forced full sync is required.
    Conflict,
}

/// Client side of the remote policy server protocol.
#[async_trait]
pub trait RbacApi: Send + Sync + fmt::Debug {
    /// Post a resource delta.
    async fn post_resources(&self, body: &ResourcePost) -> AuthzResult<PostOutcome>;

    /// Per-project permissions of a user.
    async fn project_permissions(&self, username: &str) -> AuthzResult<PermissionMap>;

    /// Server-wide permissions of a user.
    async fn server_permissions(&self, username: &str) -> AuthzResult<PermissionMap>;

    /// Block until the remote policy changes after `last_change`, returning
    /// the new change token.
    async fn watch_changes(&self, last_change: Option<&str>) -> AuthzResult<String>;
}

/// [`RbacApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRbacApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRbacApi {
    /// Create a client for the server at `base_url`.
    ///
    /// `timeout` bounds every request except the change long-poll.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_permissions(&self, path: &str, username: &str) -> AuthzResult<PermissionMap> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("u", username)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        decode(response, "failed to fetch user permissions").await
    }
}

fn unavailable(err: reqwest::Error) -> AuthzError {
    AuthzError::RemoteUnavailable(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, context: &str) -> AuthzResult<T> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(AuthzError::RemoteStatus {
            status: status.as_u16(),
            context: context.to_string(),
        });
    }

    let body = response.bytes().await.map_err(unavailable)?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl RbacApi for HttpRbacApi {
    #[instrument(
        skip(self, body),
        fields(updates = body.updates.len(), removals = body.removals.len())
    )]
    async fn post_resources(&self, body: &ResourcePost) -> AuthzResult<PostOutcome> {
        let response = self
            .client
            .post(self.url(RESOURCES_PATH))
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == StatusCode::CONFLICT {
            debug!("resource sync token rejected");
            return Ok(PostOutcome::Conflict);
        }

        let posted: ResourcePostResponse = decode(response, "failed to post resources").await?;
        Ok(PostOutcome::Synced(posted.sync_id))
    }

    #[instrument(skip(self))]
    async fn project_permissions(&self, username: &str) -> AuthzResult<PermissionMap> {
        self.get_permissions(PROJECT_PERMISSIONS_PATH, username).await
    }

    #[instrument(skip(self))]
    async fn server_permissions(&self, username: &str) -> AuthzResult<PermissionMap> {
        self.get_permissions(SERVER_PERMISSIONS_PATH, username).await
    }

    #[instrument(skip(self))]
    async fn watch_changes(&self, last_change: Option<&str>) -> AuthzResult<String> {
        let mut request = self.client.get(self.url(CHANGES_PATH));
        if let Some(token) = last_change {
            request = request.query(&[("last-change", token)]);
        }

        let response = request.send().await.map_err(unavailable)?;
        let changes: ChangesResponse = decode(response, "failed to watch for changes").await?;
        Ok(changes.last_change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_body_field_names() {
        let body = ResourcePost {
            last_sync_id: None,
            updates: vec![ResourceUpdate {
                identifier: "1".to_string(),
                name: "default".to_string(),
            }],
            removals: vec!["2".to_string()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "last-sync-id": null,
                "updates": [{"identifier": "1", "name": "default"}],
                "removals": ["2"],
            })
        );
    }

    #[test]
    fn test_base_url_is_normalised() {
        let api = HttpRbacApi::new("http://rbac.example/", Duration::from_secs(1));
        assert_eq!(api.base_url(), "http://rbac.example");
        assert_eq!(
            api.url(CHANGES_PATH),
            "http://rbac.example/api/service/v1/changes"
        );
    }
}
