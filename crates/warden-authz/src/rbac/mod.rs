//! Remote-policy-server driver.
//!
//! Mirrors per-user permissions from a remote RBAC service. The driver keeps
//! two pieces of state in sync with the remote side:
//!
//! - a [`ResourceMap`] of project names to remote identifiers, pushed with a
//!   monotonic sync token and rebuilt wholesale on a forced full sync
//! - a [`PermissionCache`] populated lazily per user and flushed wholesale
//!   whenever the change long-poll reports a remote policy change
//!
//! TLS callers are delegated to the certificate-restriction rules.

pub mod api;
pub mod cache;
pub mod permissions;
pub mod resources;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use warden_core::{
    AuthenticationProtocol, AuthzError, AuthzResult, Object, ObjectType, Relation, RequestContext,
};
use warden_telemetry::metrics::RBAC_SYNC_FAILURES;

pub use api::{HttpRbacApi, PermissionMap, PostOutcome, RbacApi, ResourcePost, ResourceUpdate};
pub use cache::{CacheStats, PermissionCache, UserPermissions};
pub use permissions::{required_permission, Permission, Requirement};
pub use resources::ResourceMap;

use crate::checker::{AllowAll, DenyAll, PermissionChecker, ProjectChecker};
use crate::driver::{Driver, LoadOptions, ProjectLister};
use crate::hooks::EntityHooks;
use crate::tls::TlsDriver;

/// Configuration key of the remote server URL.
pub const API_URL_KEY: &str = "rbac.api.url";
/// Configuration key of the full sync retry interval, in seconds.
pub const SYNC_RETRY_KEY: &str = "rbac.sync.retry_interval";
/// Configuration key of the change watch retry interval, in seconds.
pub const CHANGES_RETRY_KEY: &str = "rbac.changes.retry_interval";
/// Configuration key of the request timeout, in seconds.
pub const REQUEST_TIMEOUT_KEY: &str = "rbac.request.timeout";

const DEFAULT_SYNC_RETRY_SECS: u64 = 60;
const DEFAULT_CHANGES_RETRY_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Resource synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No full sync has succeeded yet.
    #[default]
    Unsynced,
    /// A full sync is in flight.
    Syncing,
    /// The last full sync succeeded.
    Synced,
}

/// Snapshot of the driver's synchronization state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacStatus {
    /// Current sync state.
    pub state: SyncState,
    /// When the last full sync succeeded.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Number of known projects.
    pub resources: usize,
    /// Permission cache statistics.
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    sync_retry: Duration,
    changes_retry: Duration,
    request_timeout: Duration,
}

impl Settings {
    fn from_options(options: &LoadOptions) -> AuthzResult<Self> {
        Ok(Self {
            sync_retry: Duration::from_secs(
                options.parse_config(SYNC_RETRY_KEY, DEFAULT_SYNC_RETRY_SECS)?,
            ),
            changes_retry: Duration::from_secs(
                options.parse_config(CHANGES_RETRY_KEY, DEFAULT_CHANGES_RETRY_SECS)?,
            ),
            request_timeout: Duration::from_secs(
                options.parse_config(REQUEST_TIMEOUT_KEY, DEFAULT_REQUEST_TIMEOUT_SECS)?,
            ),
        })
    }
}

/// State shared between decision calls and the background loops.
struct Inner {
    api: Arc<dyn RbacApi>,
    projects: Arc<dyn ProjectLister>,
    tls: TlsDriver,
    settings: Settings,
    resources: RwLock<ResourceMap>,
    permissions: PermissionCache,
    /// Serializes resource posts; holds the current sync token.
    sync_id: AsyncMutex<Option<String>>,
    status: RwLock<(SyncState, Option<DateTime<Utc>>)>,
}

impl Inner {
    fn set_state(&self, state: SyncState) {
        let mut status = self.status.write();
        status.0 = state;
        if state == SyncState::Synced {
            status.1 = Some(Utc::now());
        }
    }

    /// Push a resource delta, falling back to a full sync when no token is
    /// held or the server rejects it.
    async fn post_resources(
        &self,
        updates: Vec<ResourceUpdate>,
        removals: Vec<String>,
        force: bool,
    ) -> AuthzResult<()> {
        let mut sync_id = self.sync_id.lock().await;
        if force || sync_id.is_none() {
            return self.full_sync(&mut sync_id).await;
        }

        let body = ResourcePost {
            last_sync_id: sync_id.clone(),
            updates,
            removals,
        };
        match self.api.post_resources(&body).await? {
            PostOutcome::Synced(token) => {
                debug!(sync_id = %token, "resource delta accepted");
                *sync_id = Some(token);
                Ok(())
            }
            PostOutcome::Conflict => {
                warn!("resource sync token is stale, forcing a full sync");
                self.full_sync(&mut sync_id).await
            }
        }
    }

    async fn full_sync(&self, sync_id: &mut Option<String>) -> AuthzResult<()> {
        self.set_state(SyncState::Syncing);
        match self.push_all_resources(sync_id).await {
            Ok(()) => {
                self.set_state(SyncState::Synced);
                Ok(())
            }
            Err(err) => {
                self.set_state(SyncState::Unsynced);
                metrics::counter!(RBAC_SYNC_FAILURES).increment(1);
                Err(err)
            }
        }
    }

    #[instrument(skip_all)]
    async fn push_all_resources(&self, sync_id: &mut Option<String>) -> AuthzResult<()> {
        let projects = self
            .projects
            .list_projects()
            .await
            .map_err(|e| e.context("failed to list projects"))?;
        let map = ResourceMap::from_pairs(
            projects
                .into_iter()
                .map(|project| (project.name, project.id.to_string())),
        );

        let body = ResourcePost {
            last_sync_id: None,
            updates: map.updates(),
            removals: Vec::new(),
        };
        match self.api.post_resources(&body).await? {
            PostOutcome::Synced(token) => {
                info!(sync_id = %token, projects = map.len(), "resources fully synced");
                *self.resources.write() = map;
                *sync_id = Some(token);
                Ok(())
            }
            PostOutcome::Conflict => Err(AuthzError::RemoteStatus {
                status: 409,
                context: "forced resource sync rejected".to_string(),
            }),
        }
    }

    async fn user_permissions(&self, username: &str) -> AuthzResult<UserPermissions> {
        let generation = self.permissions.generation();
        match self.permissions.get(username) {
            Some(permissions) => Ok(permissions),
            None => self
                .sync_permissions(username, generation)
                .await
                .map_err(|e| e.context("failed to sync user permissions")),
        }
    }

    #[instrument(skip(self))]
    async fn sync_permissions(
        &self,
        username: &str,
        generation: u64,
    ) -> AuthzResult<UserPermissions> {
        let by_resource = self.api.project_permissions(username).await?;
        let server = self.api.server_permissions(username).await?;

        let is_admin = server
            .get(cache::SERVER_BUCKET)
            .is_some_and(|granted| granted.iter().any(|p| p == Permission::Admin.as_str()));
        let mut permissions = if is_admin {
            UserPermissions::admin()
        } else {
            UserPermissions::new()
        };

        {
            let resources = self.resources.read();
            for (key, granted) in by_resource {
                match resources.name_for_key(&key) {
                    Some(project) => permissions.set_project(project, granted),
                    None => debug!(key = %key, "dropping permissions for unknown resource"),
                }
            }
        }

        if !self
            .permissions
            .insert_if_current(username, permissions.clone(), generation)
        {
            debug!(username, "permissions changed during fetch, not caching");
        }
        Ok(permissions)
    }

    async fn full_sync_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let result = tokio::select! {
                result = self.post_resources(Vec::new(), Vec::new(), true) => result,
                () = cancelled(&mut shutdown) => return,
            };

            let Err(err) = result else {
                return;
            };
            warn!(
                error = %err,
                retry_in = ?self.settings.sync_retry,
                "failed to sync resources with the remote policy server"
            );

            tokio::select! {
                () = tokio::time::sleep(self.settings.sync_retry) => {}
                () = cancelled(&mut shutdown) => return,
            }
        }
    }

    async fn watch_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut last_change: Option<String> = None;
        loop {
            let result = tokio::select! {
                result = self.api.watch_changes(last_change.as_deref()) => result,
                () = cancelled(&mut shutdown) => return,
            };

            match result {
                Ok(token) => {
                    debug!(last_change = %token, "remote policy changed, flushing cache");
                    last_change = Some(token);
                    self.permissions.flush();
                    continue;
                }
                Err(err) if err.is_retryable() => {
                    debug!(error = %err, "change watch interrupted");
                }
                Err(err) => {
                    warn!(error = %err, "failed to watch for remote policy changes");
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.settings.changes_retry) => {}
                () = cancelled(&mut shutdown) => return,
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// The remote-policy-server driver, registered as `rbac`.
#[derive(Default)]
pub struct RbacDriver {
    api: Option<Arc<dyn RbacApi>>,
    inner: Option<Arc<Inner>>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for RbacDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RbacDriver")
            .field("api", &self.api)
            .field("status", &self.status())
            .finish()
    }
}

impl RbacDriver {
    /// Registry name.
    pub const NAME: &'static str = "rbac";

    /// Create a driver that talks to the server through `api` instead of
    /// building an HTTP client from `rbac.api.url`.
    pub fn with_api(api: Arc<dyn RbacApi>) -> Self {
        Self {
            api: Some(api),
            inner: None,
            shutdown: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Current synchronization state.
    pub fn status(&self) -> RbacStatus {
        let Some(inner) = &self.inner else {
            return RbacStatus::default();
        };
        let (state, last_synced_at) = *inner.status.read();
        RbacStatus {
            state,
            last_synced_at,
            resources: inner.resources.read().len(),
            cache: inner.permissions.stats(),
        }
    }

    fn inner(&self) -> AuthzResult<&Arc<Inner>> {
        self.inner
            .as_ref()
            .ok_or_else(|| AuthzError::configuration("rbac driver used before load"))
    }

    async fn remote_permissions(&self, ctx: &RequestContext) -> AuthzResult<UserPermissions> {
        self.inner()?.user_permissions(&ctx.username).await
    }
}

/// How a caller is evaluated.
enum Route {
    Allow,
    Deny,
    Certificate,
    Remote,
}

fn route(ctx: &RequestContext) -> Route {
    if ctx.is_internal() {
        return Route::Allow;
    }
    match ctx.protocol {
        None => Route::Deny,
        Some(AuthenticationProtocol::Tls) => Route::Certificate,
        Some(_) => Route::Remote,
    }
}

#[async_trait]
impl EntityHooks for RbacDriver {
    async fn add_project(&self, id: i64, name: &str) -> AuthzResult<()> {
        let inner = self.inner()?;
        let identifier = id.to_string();
        inner.resources.write().insert(name, identifier.clone());
        inner
            .post_resources(
                vec![ResourceUpdate {
                    identifier,
                    name: name.to_string(),
                }],
                Vec::new(),
                false,
            )
            .await
    }

    async fn delete_project(&self, id: i64, name: &str) -> AuthzResult<()> {
        let inner = self.inner()?;
        let identifier = inner
            .resources
            .write()
            .remove(name)
            .unwrap_or_else(|| id.to_string());
        inner.post_resources(Vec::new(), vec![identifier], false).await
    }

    async fn rename_project(&self, id: i64, old_name: &str, new_name: &str) -> AuthzResult<()> {
        let inner = self.inner()?;
        let identifier = id.to_string();
        {
            let mut resources = inner.resources.write();
            resources.remove(old_name);
            resources.insert(new_name, identifier.clone());
        }
        inner
            .post_resources(
                vec![ResourceUpdate {
                    identifier,
                    name: new_name.to_string(),
                }],
                Vec::new(),
                false,
            )
            .await
    }
}

#[async_trait]
impl Driver for RbacDriver {
    fn driver(&self) -> &'static str {
        Self::NAME
    }

    async fn load(&mut self, options: &LoadOptions) -> AuthzResult<()> {
        let settings = Settings::from_options(options)?;
        let projects = options.require_project_lister()?;
        let tls = TlsDriver::new(options.require_certificates()?);

        let api = match self.api.as_ref().or(options.rbac_api.as_ref()) {
            Some(api) => Arc::clone(api),
            None => {
                let url = options
                    .config_value(API_URL_KEY)
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| {
                        AuthzError::configuration(format!("{API_URL_KEY} is required"))
                    })?;
                Arc::new(HttpRbacApi::new(url, settings.request_timeout)) as Arc<dyn RbacApi>
            }
        };

        let inner = Arc::new(Inner {
            api,
            projects,
            tls,
            settings,
            resources: RwLock::new(ResourceMap::new()),
            permissions: PermissionCache::new(),
            sync_id: AsyncMutex::new(None),
            status: RwLock::new((SyncState::Unsynced, None)),
        });

        let (shutdown, receiver) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(Arc::clone(&inner).full_sync_loop(receiver.clone())),
            tokio::spawn(Arc::clone(&inner).watch_loop(receiver)),
        ];

        *self.tasks.lock() = tasks;
        self.shutdown = Some(shutdown);
        self.inner = Some(inner);

        info!(driver = Self::NAME, "authorization driver loaded");
        Ok(())
    }

    async fn stop_service(&self) -> AuthzResult<()> {
        if let Some(shutdown) = &self.shutdown {
            shutdown.send_replace(true);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "rbac background task ended abnormally");
            }
        }
        Ok(())
    }

    async fn check_permission(
        &self,
        ctx: &RequestContext,
        object: &Object,
        relation: Relation,
    ) -> AuthzResult<()> {
        match route(ctx) {
            Route::Allow => return Ok(()),
            Route::Deny => return Err(AuthzError::forbidden("caller is not authenticated")),
            Route::Certificate => {
                return self.inner()?.tls.check_permission(ctx, object, relation).await
            }
            Route::Remote => {}
        }

        let permissions = self.remote_permissions(ctx).await?;
        if permissions.is_admin() {
            return Ok(());
        }

        let permission = match required_permission(object.object_type(), relation)? {
            Requirement::AnyAuthenticated => return Ok(()),
            Requirement::Permission(permission) => permission,
        };

        let allowed = permission != Permission::Admin
            && object
                .project()
                .is_some_and(|project| permissions.has(project, permission));
        if allowed {
            Ok(())
        } else {
            Err(AuthzError::forbidden(format!(
                "user {:?} lacks {permission} for {object}",
                ctx.username
            )))
        }
    }

    async fn get_permission_checker(
        &self,
        ctx: &RequestContext,
        relation: Relation,
        object_type: ObjectType,
    ) -> AuthzResult<Box<dyn PermissionChecker>> {
        match route(ctx) {
            Route::Allow => return Ok(Box::new(AllowAll)),
            Route::Deny => return Err(AuthzError::forbidden("caller is not authenticated")),
            Route::Certificate => {
                return self
                    .inner()?
                    .tls
                    .get_permission_checker(ctx, relation, object_type)
                    .await
            }
            Route::Remote => {}
        }

        let permissions = self.remote_permissions(ctx).await?;
        if permissions.is_admin() {
            return Ok(Box::new(AllowAll));
        }

        match required_permission(object_type, relation)? {
            Requirement::AnyAuthenticated => Ok(Box::new(AllowAll)),
            Requirement::Permission(Permission::Admin) => Ok(Box::new(DenyAll)),
            Requirement::Permission(permission) => Ok(Box::new(ProjectChecker::new(
                permissions.projects_with(permission),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::MemoryCertificateCache;
    use crate::driver::ProjectRef;

    #[derive(Debug, Default)]
    struct StaticApi;

    #[async_trait]
    impl RbacApi for StaticApi {
        async fn post_resources(&self, _body: &ResourcePost) -> AuthzResult<PostOutcome> {
            Ok(PostOutcome::Synced("1".to_string()))
        }

        async fn project_permissions(&self, _username: &str) -> AuthzResult<PermissionMap> {
            Ok(PermissionMap::from([(
                "project-1".to_string(),
                vec!["view".to_string()],
            )]))
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
            Ok(vec![ProjectRef::new(1, "default")])
        }
    }

    async fn loaded() -> RbacDriver {
        let mut driver = RbacDriver::with_api(Arc::new(StaticApi));
        let options = LoadOptions::new()
            .with_project_lister(Arc::new(OneProject))
            .with_certificates(Arc::new(MemoryCertificateCache::new()));
        driver.load(&options).await.unwrap();
        while driver.status().state != SyncState::Synced {
            tokio::task::yield_now().await;
        }
        driver
    }

    #[tokio::test]
    async fn test_load_requires_url_without_api() {
        let mut driver = RbacDriver::default();
        let options = LoadOptions::new()
            .with_project_lister(Arc::new(OneProject))
            .with_certificates(Arc::new(MemoryCertificateCache::new()));
        let err = driver.load(&options).await.unwrap_err();
        assert!(err.to_string().contains(API_URL_KEY));
    }

    #[tokio::test]
    async fn test_view_permission_maps_to_project() {
        let driver = loaded().await;
        let ctx = RequestContext::new(AuthenticationProtocol::Candid, "bob");

        let c1 = Object::instance("default", "c1").unwrap();
        assert!(driver
            .check_permission(&ctx, &c1, Relation::CanView)
            .await
            .is_ok());
        assert!(driver
            .check_permission(&ctx, &c1, Relation::CanExec)
            .await
            .unwrap_err()
            .is_forbidden());
        assert!(driver
            .check_permission(&ctx, &Object::server(), Relation::CanView)
            .await
            .is_ok());
        assert!(driver
            .check_permission(&ctx, &Object::server(), Relation::CanEdit)
            .await
            .unwrap_err()
            .is_forbidden());

        let checker = driver
            .get_permission_checker(&ctx, Relation::CanView, ObjectType::Instance)
            .await
            .unwrap();
        assert!(checker.allows(&c1));
        assert!(!checker.allows(&Object::instance("other", "c1").unwrap()));

        driver.stop_service().await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthenticated_is_forbidden() {
        let driver = loaded().await;
        let ctx = RequestContext {
            protocol: None,
            ..RequestContext::new(AuthenticationProtocol::Candid, "anon")
        };
        assert!(driver
            .check_permission(&ctx, &Object::server(), Relation::CanView)
            .await
            .unwrap_err()
            .is_forbidden());
        driver.stop_service().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_shutdown() {
        let (sender, mut receiver) = watch::channel(false);
        sender.send_replace(true);
        cancelled(&mut receiver).await;

        let (sender, mut receiver) = watch::channel(false);
        drop(sender);
        cancelled(&mut receiver).await;
    }
}
