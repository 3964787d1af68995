//! Relations (entitlements) that can be held on an authorization object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;

/// A relation between a caller and an authorization object.
///
/// Which relations are valid depends on the object type; see
/// [`ObjectType::relations`](crate::ObjectType::relations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Full control.
    Admin,
    /// Operational control without configuration rights.
    Operator,
    /// Read-only access.
    Viewer,
    /// Interactive use of an instance (or basic server access).
    User,
    /// Membership of a group.
    Member,
    /// View the object.
    CanView,
    /// Edit the object.
    CanEdit,
    /// Delete the object.
    CanDelete,
    /// Create storage pools.
    CanCreateStoragePools,
    /// Create projects.
    CanCreateProjects,
    /// View server hardware resources.
    CanViewResources,
    /// Create trusted certificates.
    CanCreateCertificates,
    /// Scrape metrics.
    CanViewMetrics,
    /// Target a specific cluster member regardless of project restrictions.
    CanOverrideClusterTargetRestriction,
    /// View events of other projects and of the server itself.
    CanViewPrivilegedEvents,
    /// Create identity groups.
    CanCreateGroups,
    /// Create images in a project.
    CanCreateImages,
    /// Create image aliases in a project.
    CanCreateImageAliases,
    /// Create instances in a project.
    CanCreateInstances,
    /// Create networks in a project.
    CanCreateNetworks,
    /// Create network ACLs in a project.
    CanCreateNetworkAcls,
    /// Create network zones in a project.
    CanCreateNetworkZones,
    /// Create profiles in a project.
    CanCreateProfiles,
    /// Create storage volumes in a project.
    CanCreateStorageVolumes,
    /// Create storage buckets in a project.
    CanCreateStorageBuckets,
    /// View operations in a project.
    CanViewOperations,
    /// View events in a project.
    CanViewEvents,
    /// Start, stop, freeze or restart an instance.
    CanUpdateState,
    /// Create, restore and delete snapshots.
    CanManageSnapshots,
    /// Create, export and delete backups.
    CanManageBackups,
    /// Connect to an instance over SFTP.
    CanConnectSftp,
    /// Push and pull files.
    CanAccessFiles,
    /// Attach to the instance console.
    CanAccessConsole,
    /// Run commands in an instance.
    CanExec,
}

impl Relation {
    /// Every relation, in declaration order.
    pub const ALL: [Relation; 34] = [
        Self::Admin,
        Self::Operator,
        Self::Viewer,
        Self::User,
        Self::Member,
        Self::CanView,
        Self::CanEdit,
        Self::CanDelete,
        Self::CanCreateStoragePools,
        Self::CanCreateProjects,
        Self::CanViewResources,
        Self::CanCreateCertificates,
        Self::CanViewMetrics,
        Self::CanOverrideClusterTargetRestriction,
        Self::CanViewPrivilegedEvents,
        Self::CanCreateGroups,
        Self::CanCreateImages,
        Self::CanCreateImageAliases,
        Self::CanCreateInstances,
        Self::CanCreateNetworks,
        Self::CanCreateNetworkAcls,
        Self::CanCreateNetworkZones,
        Self::CanCreateProfiles,
        Self::CanCreateStorageVolumes,
        Self::CanCreateStorageBuckets,
        Self::CanViewOperations,
        Self::CanViewEvents,
        Self::CanUpdateState,
        Self::CanManageSnapshots,
        Self::CanManageBackups,
        Self::CanConnectSftp,
        Self::CanAccessFiles,
        Self::CanAccessConsole,
        Self::CanExec,
    ];

    /// The wire name of the relation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
            Self::User => "user",
            Self::Member => "member",
            Self::CanView => "can_view",
            Self::CanEdit => "can_edit",
            Self::CanDelete => "can_delete",
            Self::CanCreateStoragePools => "can_create_storage_pools",
            Self::CanCreateProjects => "can_create_projects",
            Self::CanViewResources => "can_view_resources",
            Self::CanCreateCertificates => "can_create_certificates",
            Self::CanViewMetrics => "can_view_metrics",
            Self::CanOverrideClusterTargetRestriction => {
                "can_override_cluster_target_restriction"
            }
            Self::CanViewPrivilegedEvents => "can_view_privileged_events",
            Self::CanCreateGroups => "can_create_groups",
            Self::CanCreateImages => "can_create_images",
            Self::CanCreateImageAliases => "can_create_image_aliases",
            Self::CanCreateInstances => "can_create_instances",
            Self::CanCreateNetworks => "can_create_networks",
            Self::CanCreateNetworkAcls => "can_create_network_acls",
            Self::CanCreateNetworkZones => "can_create_network_zones",
            Self::CanCreateProfiles => "can_create_profiles",
            Self::CanCreateStorageVolumes => "can_create_storage_volumes",
            Self::CanCreateStorageBuckets => "can_create_storage_buckets",
            Self::CanViewOperations => "can_view_operations",
            Self::CanViewEvents => "can_view_events",
            Self::CanUpdateState => "can_update_state",
            Self::CanManageSnapshots => "can_manage_snapshots",
            Self::CanManageBackups => "can_manage_backups",
            Self::CanConnectSftp => "can_connect_sftp",
            Self::CanAccessFiles => "can_access_files",
            Self::CanAccessConsole => "can_access_console",
            Self::CanExec => "can_exec",
        }
    }

    /// Whether the relation only grants read access to server-level state.
    ///
    /// These are the relations a restricted caller keeps on objects that do
    /// not belong to any project.
    pub const fn is_view_class(&self) -> bool {
        matches!(
            self,
            Self::CanView | Self::CanViewResources | Self::CanViewMetrics
        )
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| AuthzError::invalid_argument(format!("unknown relation {s:?}")))
    }
}
