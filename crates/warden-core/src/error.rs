//! Error types shared by every authorization component.

use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur while making an authorization decision.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// Malformed object, unknown type, wrong arity or a relation the type does
    /// not declare.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No grant matched under the active driver's rules.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Reason for denial.
        reason: String,
    },

    /// No driver is registered under the requested name.
    #[error("unknown authorization driver: {0}")]
    UnknownDriver(String),

    /// Driver options or startup configuration are unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote policy server could not be reached.
    #[error("remote policy server unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote policy server answered with an unexpected status.
    #[error("{context}: remote policy server returned status {status}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
        /// What the request was for.
        context: String,
    },

    /// No coarse permission is mapped for the object type and relation.
    #[error("no permission mapping for relation {relation:?} on object type {object_type:?}")]
    MappingGap {
        /// Object type name.
        object_type: String,
        /// Relation name.
        relation: String,
    },

    /// The relationship engine failed.
    #[error("relationship engine error: {0}")]
    Engine(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error with added context.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted.
        context: String,
        /// Underlying error.
        #[source]
        source: Box<AuthzError>,
    },
}

impl AuthzError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a mapping gap error.
    pub fn mapping_gap(object_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::MappingGap {
            object_type: object_type.into(),
            relation: relation.into(),
        }
    }

    /// Wrap this error with context.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a clean policy denial.
    pub fn is_forbidden(&self) -> bool {
        matches!(self.root(), Self::Forbidden { .. })
    }

    /// Check if this is a local validation error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.root(), Self::InvalidArgument(_))
    }

    /// Check if this is a retryable error.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::RemoteUnavailable(_) => true,
            Self::RemoteStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
