//! Per-user permission cache.
//!
//! Entries are populated lazily on first use and flushed wholesale whenever
//! the remote server reports a change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use warden_telemetry::metrics::{RBAC_CACHE_FLUSHES, RBAC_CACHE_HITS, RBAC_CACHE_MISSES};

use super::permissions::Permission;

/// Bucket holding server-wide permissions.
pub const SERVER_BUCKET: &str = "";

/// Permissions of one user, keyed by project name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPermissions {
    projects: HashMap<String, Vec<String>>,
}

impl UserPermissions {
    /// Create an empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissions of a server administrator.
    pub fn admin() -> Self {
        let mut permissions = Self::new();
        permissions.grant(SERVER_BUCKET, Permission::Admin.as_str());
        permissions
    }

    /// Grant a permission on a project (or the server bucket).
    pub fn grant(&mut self, project: impl Into<String>, permission: impl Into<String>) {
        let entry = self.projects.entry(project.into()).or_default();
        let permission = permission.into();
        if !entry.contains(&permission) {
            entry.push(permission);
        }
    }

    /// Replace the permissions of a project.
    pub fn set_project(&mut self, project: impl Into<String>, permissions: Vec<String>) {
        self.projects.insert(project.into(), permissions);
    }

    /// Whether the user is a server administrator.
    pub fn is_admin(&self) -> bool {
        self.has(SERVER_BUCKET, Permission::Admin)
    }

    /// Whether the user holds `permission` on `project`.
    pub fn has(&self, project: &str, permission: Permission) -> bool {
        self.projects
            .get(project)
            .is_some_and(|granted| granted.iter().any(|p| p == permission.as_str()))
    }

    /// Projects on which the user holds `permission`.
    pub fn projects_with(&self, permission: Permission) -> Vec<String> {
        self.projects
            .iter()
            .filter(|(project, granted)| {
                project.as_str() != SERVER_BUCKET
                    && granted.iter().any(|p| p == permission.as_str())
            })
            .map(|(project, _)| project.clone())
            .collect()
    }

    /// Number of project buckets, including the server bucket.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether no bucket is present.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of wholesale flushes.
    pub flushes: u64,
    /// Number of users currently cached.
    pub size: usize,
}

#[derive(Debug, Default)]
struct Entries {
    users: HashMap<String, UserPermissions>,
    /// Bumped on every flush.
    generation: u64,
}

/// Permission cache shared by every decision call.
///
/// A fetch started before a flush must not repopulate the cache after it, so
/// writers capture [`PermissionCache::generation`] before fetching and insert
/// through [`PermissionCache::insert_if_current`].
#[derive(Debug, Default)]
pub struct PermissionCache {
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    flushes: AtomicU64,
}

impl PermissionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user's permissions.
    pub fn get(&self, username: &str) -> Option<UserPermissions> {
        let found = self.entries.read().users.get(username).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(RBAC_CACHE_HITS).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(RBAC_CACHE_MISSES).increment(1);
        }
        found
    }

    /// Current flush generation.
    pub fn generation(&self) -> u64 {
        self.entries.read().generation
    }

    /// Replace a user's entry.
    pub fn insert(&self, username: impl Into<String>, permissions: UserPermissions) {
        self.entries.write().users.insert(username.into(), permissions);
    }

    /// Replace a user's entry unless the cache was flushed since `generation`
    /// was read. Returns whether the entry was stored.
    pub fn insert_if_current(
        &self,
        username: impl Into<String>,
        permissions: UserPermissions,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries.write();
        if entries.generation != generation {
            return false;
        }
        entries.users.insert(username.into(), permissions);
        true
    }

    /// Drop every user's entry.
    pub fn flush(&self) {
        {
            let mut entries = self.entries.write();
            entries.users.clear();
            entries.generation += 1;
        }
        self.flushes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(RBAC_CACHE_FLUSHES).increment(1);
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            size: self.entries.read().users.len(),
        }
    }
}
