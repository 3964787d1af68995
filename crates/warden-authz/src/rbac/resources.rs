//! Local view of the project resources registered with the remote server.

use std::collections::HashMap;

use super::api::ResourceUpdate;

/// Prefix of project resources in permission responses.
pub const PROJECT_KEY_PREFIX: &str = "project-";

/// Bidirectional project name to remote identifier map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    by_name: HashMap<String, String>,
    by_identifier: HashMap<String, String>,
}

impl ResourceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(name, identifier)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Self::new();
        for (name, identifier) in pairs {
            map.insert(name, identifier);
        }
        map
    }

    /// Map `name` to `identifier`, dropping any stale entry for either.
    pub fn insert(&mut self, name: impl Into<String>, identifier: impl Into<String>) {
        let name = name.into();
        let identifier = identifier.into();

        if let Some(old_name) = self.by_identifier.remove(&identifier) {
            self.by_name.remove(&old_name);
        }
        if let Some(old_identifier) = self.by_name.remove(&name) {
            self.by_identifier.remove(&old_identifier);
        }

        self.by_identifier.insert(identifier.clone(), name.clone());
        self.by_name.insert(name, identifier);
    }

    /// Remove a project by name, returning its identifier.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let identifier = self.by_name.remove(name)?;
        self.by_identifier.remove(&identifier);
        Some(identifier)
    }

    /// Identifier of a project.
    pub fn identifier(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Project name for a remote identifier.
    pub fn name(&self, identifier: &str) -> Option<&str> {
        self.by_identifier.get(identifier).map(String::as_str)
    }

    /// Project name for a key of a permissions response.
    pub fn name_for_key(&self, key: &str) -> Option<&str> {
        key.strip_prefix(PROJECT_KEY_PREFIX)
            .and_then(|identifier| self.name(identifier))
    }

    /// Every entry as a resource update, sorted by name.
    pub fn updates(&self) -> Vec<ResourceUpdate> {
        let mut updates: Vec<_> = self
            .by_name
            .iter()
            .map(|(name, identifier)| ResourceUpdate {
                identifier: identifier.clone(),
                name: name.clone(),
            })
            .collect();
        updates.sort_by(|a, b| a.name.cmp(&b.name));
        updates
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
