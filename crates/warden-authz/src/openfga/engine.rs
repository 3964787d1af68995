//! Contract of the external relationship engine and its tuple datastore.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_core::{AuthzResult, Object, ObjectType, Relation};

/// A `(user, relation, object)` relationship.
///
/// `user` is either a plain object (`user:alice`) or a userset
/// (`group:ops#member`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    /// Subject of the relationship.
    pub user: String,
    /// Relation name.
    pub relation: String,
    /// Object in `<type>:<identifier>` form.
    pub object: String,
}

impl Tuple {
    /// Create a tuple from its parts.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// `subject` holds `relation` on `object`.
    pub fn relation(subject: &Object, relation: Relation, object: &Object) -> Self {
        Self::new(subject.to_string(), relation.as_str(), object.to_string())
    }

    /// `parent` is the `relation` parent of `child` (e.g. the project of an
    /// instance).
    pub fn parent(parent: &Object, relation: &str, child: &Object) -> Self {
        Self::new(parent.to_string(), relation, child.to_string())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// The relation schema registered at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationModel {
    /// Store the model is written to.
    pub store_id: String,
    /// Human-readable store name.
    pub store_name: String,
    /// Model in OpenFGA DSL form.
    pub dsl: String,
}

/// A single-object decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// Store to evaluate against.
    pub store_id: String,
    /// The relationship being asked about.
    pub tuple: Tuple,
    /// Request-scoped tuples evaluated as if they were persisted.
    pub contextual_tuples: Vec<Tuple>,
}

/// A bulk decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsRequest {
    /// Store to evaluate against.
    pub store_id: String,
    /// Type of the objects to list.
    pub object_type: ObjectType,
    /// Relation the user must hold.
    pub relation: Relation,
    /// Subject of the query.
    pub user: String,
    /// Request-scoped tuples evaluated as if they were persisted.
    pub contextual_tuples: Vec<Tuple>,
}

/// The relationship evaluation engine.
#[async_trait]
pub trait RebacEngine: Send + Sync {
    /// Register the relation schema, returning the model identifier.
    async fn write_authorization_model(&self, model: &AuthorizationModel) -> AuthzResult<String>;

    /// Whether the tuple holds.
    async fn check(&self, request: &CheckRequest) -> AuthzResult<bool>;

    /// Every object of the requested type the user holds the relation on, in
    /// `<type>:<identifier>` form.
    async fn list_objects(&self, request: &ListObjectsRequest) -> AuthzResult<Vec<String>>;
}

/// Persistent tuple storage backing the engine.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Persist tuples.
    async fn write(&self, tuples: &[Tuple]) -> AuthzResult<()>;

    /// Remove tuples.
    async fn delete(&self, tuples: &[Tuple]) -> AuthzResult<()>;
}
