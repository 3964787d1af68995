//! Per-request caller details consumed by the authorization drivers.
//!
//! The request context is produced by whatever terminates the inbound call
//! (HTTP router, unix socket listener, cluster notifier). Drivers only read
//! it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationProtocol {
    /// Mutual TLS with a trusted client certificate.
    Tls,
    /// Candid macaroon-based authentication.
    Candid,
    /// OpenID Connect bearer tokens.
    Oidc,
}

impl AuthenticationProtocol {
    /// The wire name of the protocol.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tls => "tls",
            Self::Candid => "candid",
            Self::Oidc => "oidc",
        }
    }
}

impl fmt::Display for AuthenticationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationProtocol {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tls" => Ok(Self::Tls),
            "candid" => Ok(Self::Candid),
            "oidc" => Ok(Self::Oidc),
            other => Err(AuthzError::invalid_argument(format!(
                "unknown authentication protocol {other:?}"
            ))),
        }
    }
}

/// Caller details for a single inbound call.
///
/// For TLS callers `username` is the certificate fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Protocol the caller authenticated with, if any.
    pub protocol: Option<AuthenticationProtocol>,
    /// Caller identity.
    pub username: String,
    /// Project the request is scoped to.
    pub project: String,
    /// Whether the caller asked for resources across all projects.
    pub all_projects: bool,
    /// Whether the call came over the unix socket or from another cluster
    /// member.
    pub internal: bool,
}

impl RequestContext {
    /// A context for an authenticated remote caller.
    pub fn new(protocol: AuthenticationProtocol, username: impl Into<String>) -> Self {
        Self {
            protocol: Some(protocol),
            username: username.into(),
            project: "default".to_string(),
            all_projects: false,
            internal: false,
        }
    }

    /// A context for a unix socket or cluster-internal caller.
    pub fn internal() -> Self {
        Self {
            protocol: None,
            username: String::new(),
            project: "default".to_string(),
            all_projects: false,
            internal: true,
        }
    }

    /// Set the project the request is scoped to.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Mark the request as spanning all projects.
    pub fn with_all_projects(mut self, all_projects: bool) -> Self {
        self.all_projects = all_projects;
        self
    }

    /// Whether the caller is trusted unconditionally.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Protocol name for logging, `"none"` when unauthenticated.
    pub fn protocol_name(&self) -> &'static str {
        self.protocol.map_or("none", |p| p.as_str())
    }
}
