//! Authorization objects.
//!
//! An [`Object`] names one thing a caller can hold relations on. Its string
//! form is `<type>:<identifier>`, where the identifier is a `/`-joined list of
//! percent-escaped elements. For project-scoped types the first element is the
//! project name:
//!
//! ```text
//! server:lxd
//! project:default
//! instance:default/c1
//! storage_volume:default/pool0/custom/vol%2Fwith%2Fslashes
//! ```
//!
//! Objects can only be built through validated constructors, so an `Object`
//! value always has the arity its type declares.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};
use crate::relation::Relation;

/// Characters escaped inside a single identifier element.
const ELEMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'%')
    .add(b'?')
    .add(b'#');

/// Identifier of the single server object.
pub const SERVER_IDENTIFIER: &str = "lxd";

/// The kind of an authorization object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// The server itself.
    Server,
    /// A trusted client certificate.
    Certificate,
    /// A storage pool.
    StoragePool,
    /// An identity group.
    Group,
    /// A user identity.
    User,
    /// A project.
    Project,
    /// An image.
    Image,
    /// An image alias.
    ImageAlias,
    /// An instance.
    Instance,
    /// A network.
    Network,
    /// A network ACL.
    NetworkAcl,
    /// A network zone.
    NetworkZone,
    /// A profile.
    Profile,
    /// A storage volume.
    StorageVolume,
    /// A storage bucket.
    StorageBucket,
}

const SERVER_RELATIONS: &[Relation] = &[
    Relation::Admin,
    Relation::Viewer,
    Relation::User,
    Relation::CanView,
    Relation::CanEdit,
    Relation::CanCreateStoragePools,
    Relation::CanCreateProjects,
    Relation::CanViewResources,
    Relation::CanCreateCertificates,
    Relation::CanViewMetrics,
    Relation::CanOverrideClusterTargetRestriction,
    Relation::CanViewPrivilegedEvents,
    Relation::CanCreateGroups,
];

const PROJECT_RELATIONS: &[Relation] = &[
    Relation::Operator,
    Relation::Viewer,
    Relation::CanView,
    Relation::CanEdit,
    Relation::CanDelete,
    Relation::CanCreateImages,
    Relation::CanCreateImageAliases,
    Relation::CanCreateInstances,
    Relation::CanCreateNetworks,
    Relation::CanCreateNetworkAcls,
    Relation::CanCreateNetworkZones,
    Relation::CanCreateProfiles,
    Relation::CanCreateStorageVolumes,
    Relation::CanCreateStorageBuckets,
    Relation::CanViewOperations,
    Relation::CanViewEvents,
];

const INSTANCE_RELATIONS: &[Relation] = &[
    Relation::User,
    Relation::Operator,
    Relation::CanView,
    Relation::CanEdit,
    Relation::CanDelete,
    Relation::CanUpdateState,
    Relation::CanManageSnapshots,
    Relation::CanManageBackups,
    Relation::CanConnectSftp,
    Relation::CanAccessFiles,
    Relation::CanAccessConsole,
    Relation::CanExec,
];

const STORAGE_VOLUME_RELATIONS: &[Relation] = &[
    Relation::CanView,
    Relation::CanEdit,
    Relation::CanDelete,
    Relation::CanManageSnapshots,
    Relation::CanManageBackups,
];

const GROUP_RELATIONS: &[Relation] = &[
    Relation::Member,
    Relation::CanView,
    Relation::CanEdit,
    Relation::CanDelete,
];

const BASIC_RELATIONS: &[Relation] = &[Relation::CanView, Relation::CanEdit, Relation::CanDelete];

impl ObjectType {
    /// Every object type.
    pub const ALL: [ObjectType; 15] = [
        Self::Server,
        Self::Certificate,
        Self::StoragePool,
        Self::Group,
        Self::User,
        Self::Project,
        Self::Image,
        Self::ImageAlias,
        Self::Instance,
        Self::Network,
        Self::NetworkAcl,
        Self::NetworkZone,
        Self::Profile,
        Self::StorageVolume,
        Self::StorageBucket,
    ];

    /// The type prefix used in the string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Certificate => "certificate",
            Self::StoragePool => "storage_pool",
            Self::Group => "group",
            Self::User => "user",
            Self::Project => "project",
            Self::Image => "image",
            Self::ImageAlias => "image_alias",
            Self::Instance => "instance",
            Self::Network => "network",
            Self::NetworkAcl => "network_acl",
            Self::NetworkZone => "network_zone",
            Self::Profile => "profile",
            Self::StorageVolume => "storage_volume",
            Self::StorageBucket => "storage_bucket",
        }
    }

    /// Whether objects of this type live inside a project.
    ///
    /// A project object is its own project.
    pub const fn requires_project(&self) -> bool {
        !matches!(
            self,
            Self::Server | Self::Certificate | Self::StoragePool | Self::Group | Self::User
        )
    }

    /// Number of identifier elements, not counting the project.
    pub const fn element_count(&self) -> usize {
        match self {
            Self::Server | Self::Project => 0,
            Self::StorageVolume => 3,
            Self::StorageBucket => 2,
            _ => 1,
        }
    }

    /// The relations that can be held on objects of this type.
    pub fn relations(&self) -> &'static [Relation] {
        match self {
            Self::Server => SERVER_RELATIONS,
            Self::Project => PROJECT_RELATIONS,
            Self::Instance => INSTANCE_RELATIONS,
            Self::StorageVolume => STORAGE_VOLUME_RELATIONS,
            Self::Group => GROUP_RELATIONS,
            Self::Certificate
            | Self::StoragePool
            | Self::User
            | Self::Image
            | Self::ImageAlias
            | Self::Network
            | Self::NetworkAcl
            | Self::NetworkZone
            | Self::Profile
            | Self::StorageBucket => BASIC_RELATIONS,
        }
    }

    /// Fails if `relation` is not declared for this type.
    pub fn validate_relation(&self, relation: Relation) -> AuthzResult<()> {
        if self.relations().contains(&relation) {
            Ok(())
        } else {
            Err(AuthzError::invalid_argument(format!(
                "relation {:?} is not valid for object type {:?}",
                relation.as_str(),
                self.as_str()
            )))
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| AuthzError::invalid_argument(format!("unknown object type {s:?}")))
    }
}

/// A validated authorization object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Object {
    object_type: ObjectType,
    project: Option<String>,
    elements: Vec<String>,
}

impl Object {
    /// Build an object from its parts.
    ///
    /// `project` must be non-empty for project-scoped types (for
    /// [`ObjectType::Project`] it is the project's own name) and empty for
    /// every other type. `elements` must match the type's arity.
    pub fn new<S: AsRef<str>>(
        object_type: ObjectType,
        project: &str,
        elements: &[S],
    ) -> AuthzResult<Self> {
        let project = if object_type.requires_project() {
            if project.is_empty() {
                return Err(AuthzError::invalid_argument(format!(
                    "object type {:?} requires a project",
                    object_type.as_str()
                )));
            }
            Some(project.to_string())
        } else {
            if !project.is_empty() {
                return Err(AuthzError::invalid_argument(format!(
                    "object type {:?} is not project scoped",
                    object_type.as_str()
                )));
            }
            None
        };

        if elements.len() != object_type.element_count() {
            return Err(AuthzError::invalid_argument(format!(
                "object type {:?} takes {} identifier element(s), got {}",
                object_type.as_str(),
                object_type.element_count(),
                elements.len()
            )));
        }

        if elements.iter().any(|e| e.as_ref().is_empty()) {
            return Err(AuthzError::invalid_argument(format!(
                "object type {:?} has an empty identifier element",
                object_type.as_str()
            )));
        }

        Ok(Self {
            object_type,
            project,
            elements: elements.iter().map(|e| e.as_ref().to_string()).collect(),
        })
    }

    /// The server object.
    pub fn server() -> Self {
        Self {
            object_type: ObjectType::Server,
            project: None,
            elements: Vec::new(),
        }
    }

    /// A project object.
    pub fn project_named(name: &str) -> AuthzResult<Self> {
        Self::new::<&str>(ObjectType::Project, name, &[])
    }

    /// A certificate object.
    pub fn certificate(fingerprint: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Certificate, "", &[fingerprint])
    }

    /// A storage pool object.
    pub fn storage_pool(name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::StoragePool, "", &[name])
    }

    /// A group object.
    pub fn group(name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Group, "", &[name])
    }

    /// A user object.
    pub fn user(name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::User, "", &[name])
    }

    /// An image object.
    pub fn image(project: &str, fingerprint: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Image, project, &[fingerprint])
    }

    /// An image alias object.
    pub fn image_alias(project: &str, alias: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::ImageAlias, project, &[alias])
    }

    /// An instance object.
    pub fn instance(project: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Instance, project, &[name])
    }

    /// A network object.
    pub fn network(project: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Network, project, &[name])
    }

    /// A network ACL object.
    pub fn network_acl(project: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::NetworkAcl, project, &[name])
    }

    /// A network zone object.
    pub fn network_zone(project: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::NetworkZone, project, &[name])
    }

    /// A profile object.
    pub fn profile(project: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::Profile, project, &[name])
    }

    /// A storage volume object.
    pub fn storage_volume(
        project: &str,
        pool: &str,
        volume_type: &str,
        name: &str,
    ) -> AuthzResult<Self> {
        Self::new(ObjectType::StorageVolume, project, &[pool, volume_type, name])
    }

    /// A storage bucket object.
    pub fn storage_bucket(project: &str, pool: &str, name: &str) -> AuthzResult<Self> {
        Self::new(ObjectType::StorageBucket, project, &[pool, name])
    }

    /// Parse an object from its string form.
    pub fn parse(s: &str) -> AuthzResult<Self> {
        let (type_str, identifier) = s
            .split_once(':')
            .ok_or_else(|| AuthzError::invalid_argument(format!("malformed object {s:?}")))?;
        let object_type: ObjectType = type_str.parse()?;

        if object_type == ObjectType::Server {
            if identifier != SERVER_IDENTIFIER {
                return Err(AuthzError::invalid_argument(format!(
                    "malformed server object {s:?}"
                )));
            }
            return Ok(Self::server());
        }

        let mut elements = identifier
            .split('/')
            .map(|e| {
                percent_decode_str(e)
                    .decode_utf8()
                    .map(|d| d.into_owned())
                    .map_err(|_| {
                        AuthzError::invalid_argument(format!("object {s:?} is not valid UTF-8"))
                    })
            })
            .collect::<AuthzResult<Vec<_>>>()?;

        let project = if object_type.requires_project() {
            elements.remove(0)
        } else {
            String::new()
        };

        Self::new(object_type, &project, &elements)
    }

    /// The object's type.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// The project the object belongs to.
    ///
    /// For a project object this is the project's own name.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Identifier elements after the project.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// The identifier with the type prefix stripped.
    pub fn reference(&self) -> String {
        if self.object_type == ObjectType::Server {
            return SERVER_IDENTIFIER.to_string();
        }

        self.project
            .iter()
            .chain(self.elements.iter())
            .map(|e| utf8_percent_encode(e, ELEMENT_ESCAPE).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.reference())
    }
}

impl FromStr for Object {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Object {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Object> for String {
    fn from(object: Object) -> Self {
        object.to_string()
    }
}
