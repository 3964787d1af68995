//! Trusted certificate cache.
//!
//! The trust store itself is managed elsewhere; drivers only read the
//! restrictions attached to each fingerprint.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// What a trusted certificate may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    /// A client certificate used against the API.
    Client,
    /// A certificate only allowed to scrape metrics.
    Metrics,
    /// Another cluster member.
    Server,
}

/// Restrictions attached to one trusted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Certificate type.
    pub certificate_type: CertificateType,
    /// Projects the certificate is restricted to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    /// Groups the certificate belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl CertificateRecord {
    /// An unrestricted certificate of the given type.
    pub fn new(certificate_type: CertificateType) -> Self {
        Self {
            certificate_type,
            projects: None,
            groups: None,
        }
    }

    /// An unrestricted client certificate.
    pub fn client() -> Self {
        Self::new(CertificateType::Client)
    }

    /// Restrict the certificate to the given projects.
    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = Some(projects.into_iter().map(Into::into).collect());
        self
    }

    /// Attach group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// A certificate is restricted when either list is present, even if empty.
    pub fn is_restricted(&self) -> bool {
        self.projects.is_some() || self.groups.is_some()
    }

    /// Allowed projects, empty when none are listed.
    pub fn project_names(&self) -> &[String] {
        self.projects.as_deref().unwrap_or_default()
    }

    /// Group memberships, empty when none are listed.
    pub fn group_names(&self) -> &[String] {
        self.groups.as_deref().unwrap_or_default()
    }
}

/// Read access to the trusted certificates.
pub trait CertificateCache: Send + Sync {
    /// Look up a certificate by fingerprint.
    fn get(&self, fingerprint: &str) -> Option<CertificateRecord>;
}

/// An in-memory [`CertificateCache`].
#[derive(Debug, Default)]
pub struct MemoryCertificateCache {
    records: RwLock<HashMap<String, CertificateRecord>>,
}

impl MemoryCertificateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one certificate.
    pub fn insert(&self, fingerprint: impl Into<String>, record: CertificateRecord) {
        self.records.write().insert(fingerprint.into(), record);
    }

    /// Remove one certificate.
    pub fn remove(&self, fingerprint: &str) -> Option<CertificateRecord> {
        self.records.write().remove(fingerprint)
    }

    /// Replace the whole cache contents.
    pub fn replace_all(&self, records: HashMap<String, CertificateRecord>) {
        *self.records.write() = records;
    }

    /// Number of cached certificates.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl CertificateCache for MemoryCertificateCache {
    fn get(&self, fingerprint: &str) -> Option<CertificateRecord> {
        self.records.read().get(fingerprint).cloned()
    }
}
