//! Coarse permissions granted by the remote policy server and the table that
//! maps each `(object type, relation)` pair onto one of them.

use std::fmt;
use std::str::FromStr;

use warden_core::{AuthzError, AuthzResult, ObjectType, Relation};

/// A coarse permission as named by the remote policy server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Full control over the server.
    Admin,
    /// Read access to a project.
    View,
    /// Edit or delete a project.
    ManageProjects,
    /// Create, edit or delete instances.
    ManageContainers,
    /// Operate existing instances.
    OperateContainers,
    /// Manage images and aliases.
    ManageImages,
    /// Manage networks, ACLs and zones.
    ManageNetworks,
    /// Manage profiles.
    ManageProfiles,
    /// Manage storage volumes and buckets.
    ManageStorageVolumes,
}

impl Permission {
    /// The wire name of the permission.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::View => "view",
            Self::ManageProjects => "manage-projects",
            Self::ManageContainers => "manage-containers",
            Self::OperateContainers => "operate-containers",
            Self::ManageImages => "manage-images",
            Self::ManageNetworks => "manage-networks",
            Self::ManageProfiles => "manage-profiles",
            Self::ManageStorageVolumes => "manage-storage-volumes",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Admin,
            Self::View,
            Self::ManageProjects,
            Self::ManageContainers,
            Self::OperateContainers,
            Self::ManageImages,
            Self::ManageNetworks,
            Self::ManageProfiles,
            Self::ManageStorageVolumes,
        ]
        .into_iter()
        .find(|p| p.as_str() == s)
        .ok_or_else(|| AuthzError::invalid_argument(format!("unknown permission {s:?}")))
    }
}

/// What a caller needs to hold a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated caller.
    AnyAuthenticated,
    /// The permission on the object's project (or server-wide for `admin`).
    Permission(Permission),
}

/// Map a relation on an object type to the coarse permission it needs.
///
/// Pairs the object model does not declare are a [`AuthzError::MappingGap`].
pub fn required_permission(
    object_type: ObjectType,
    relation: Relation,
) -> AuthzResult<Requirement> {
    use Permission::*;
    use Relation as R;

    let gap = || Err(AuthzError::mapping_gap(object_type.as_str(), relation.as_str()));
    if object_type.validate_relation(relation).is_err() {
        return gap();
    }

    let permission = match object_type {
        ObjectType::Server | ObjectType::StoragePool | ObjectType::Certificate => {
            if relation.is_view_class() {
                return Ok(Requirement::AnyAuthenticated);
            }
            Admin
        }
        ObjectType::Group | ObjectType::User => Admin,
        ObjectType::Project => match relation {
            R::CanView | R::Viewer | R::CanViewOperations | R::CanViewEvents => View,
            R::CanEdit | R::CanDelete | R::Operator => ManageProjects,
            R::CanCreateImages | R::CanCreateImageAliases => ManageImages,
            R::CanCreateInstances => ManageContainers,
            R::CanCreateNetworks | R::CanCreateNetworkAcls | R::CanCreateNetworkZones => {
                ManageNetworks
            }
            R::CanCreateProfiles => ManageProfiles,
            R::CanCreateStorageVolumes | R::CanCreateStorageBuckets => ManageStorageVolumes,
            _ => return gap(),
        },
        ObjectType::Instance => match relation {
            R::CanView => View,
            R::CanEdit | R::CanDelete => ManageContainers,
            R::User
            | R::Operator
            | R::CanUpdateState
            | R::CanManageSnapshots
            | R::CanManageBackups
            | R::CanConnectSftp
            | R::CanAccessFiles
            | R::CanAccessConsole
            | R::CanExec => OperateContainers,
            _ => return gap(),
        },
        ObjectType::Image | ObjectType::ImageAlias => edit_or_view(relation, ManageImages),
        ObjectType::Network | ObjectType::NetworkAcl | ObjectType::NetworkZone => {
            edit_or_view(relation, ManageNetworks)
        }
        ObjectType::Profile => edit_or_view(relation, ManageProfiles),
        ObjectType::StorageVolume | ObjectType::StorageBucket => {
            edit_or_view(relation, ManageStorageVolumes)
        }
    };

    Ok(Requirement::Permission(permission))
}

fn edit_or_view(relation: Relation, manage: Permission) -> Permission {
    if relation == Relation::CanView {
        Permission::View
    } else {
        manage
    }
}
