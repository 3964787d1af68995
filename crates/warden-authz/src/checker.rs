//! Per-request permission checkers used to filter collections.

use std::collections::HashSet;
use std::fmt;

use warden_core::Object;

/// Decides whether one object is visible to the caller a checker was built for.
///
/// A checker is obtained once per list operation from
/// [`Driver::get_permission_checker`](crate::Driver::get_permission_checker)
/// and captures everything it needs up front, so `allows` never blocks.
/// Checkers must not be cached across requests.
pub trait PermissionChecker: Send + Sync {
    /// Returns true if the caller holds the checked relation on `object`.
    fn allows(&self, object: &Object) -> bool;
}

impl<F> PermissionChecker for F
where
    F: Fn(&Object) -> bool + Send + Sync,
{
    fn allows(&self, object: &Object) -> bool {
        self(object)
    }
}

impl fmt::Debug for dyn PermissionChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PermissionChecker")
    }
}

/// Allows every object.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn allows(&self, _object: &Object) -> bool {
        true
    }
}

/// Allows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PermissionChecker for DenyAll {
    fn allows(&self, _object: &Object) -> bool {
        false
    }
}

/// Allows objects whose project is in a fixed set.
#[derive(Debug, Clone, Default)]
pub struct ProjectChecker {
    projects: HashSet<String>,
}

impl ProjectChecker {
    /// Create a checker for the given projects.
    pub fn new<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: projects.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionChecker for ProjectChecker {
    fn allows(&self, object: &Object) -> bool {
        object
            .project()
            .is_some_and(|project| self.projects.contains(project))
    }
}

/// Allows exactly the listed objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSetChecker {
    objects: HashSet<Object>,
}

impl ObjectSetChecker {
    /// Create a checker for the given objects.
    pub fn new(objects: impl IntoIterator<Item = Object>) -> Self {
        Self {
            objects: objects.into_iter().collect(),
        }
    }

    /// Number of allowed objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object is allowed.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl PermissionChecker for ObjectSetChecker {
    fn allows(&self, object: &Object) -> bool {
        self.objects.contains(object)
    }
}
