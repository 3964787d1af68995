//! Driver registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;
use warden_core::{AuthzError, AuthzResult};

use crate::driver::{Driver, LoadOptions};
use crate::openfga::OpenFgaDriver;
use crate::rbac::RbacDriver;
use crate::tls::TlsDriver;
use crate::Authorizer;

/// Builds a fresh, unloaded driver.
pub type DriverConstructor = fn() -> Box<dyn Driver>;

/// Maps driver names to constructors.
///
/// Built once at startup and passed to whatever assembles the daemon.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: BTreeMap<&'static str, DriverConstructor>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `tls`, `rbac` and `openfga` drivers.
    pub fn builtin() -> Self {
        let mut constructors: BTreeMap<&'static str, DriverConstructor> = BTreeMap::new();
        constructors.insert(TlsDriver::NAME, || -> Box<dyn Driver> {
            Box::new(TlsDriver::default())
        });
        constructors.insert(RbacDriver::NAME, || -> Box<dyn Driver> {
            Box::new(RbacDriver::default())
        });
        constructors.insert(OpenFgaDriver::NAME, || -> Box<dyn Driver> {
            Box::new(OpenFgaDriver::default())
        });
        Self { constructors }
    }

    /// Register a driver. Names must be unique.
    pub fn register(
        &mut self,
        name: &'static str,
        constructor: DriverConstructor,
    ) -> AuthzResult<()> {
        if self.constructors.contains_key(name) {
            return Err(AuthzError::configuration(format!(
                "authorization driver {name:?} is already registered"
            )));
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    /// Whether a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct, initialise and load the named driver.
    pub async fn load_authorizer(
        &self,
        name: &str,
        options: LoadOptions,
    ) -> AuthzResult<Authorizer> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| AuthzError::UnknownDriver(name.to_string()))?;

        let mut driver = constructor();
        let context = format!("failed to load authorization driver {name:?}");
        driver.init().await.map_err(|e| e.context(context.clone()))?;
        driver.load(&options).await.map_err(|e| e.context(context))?;

        info!(driver = name, "authorization driver loaded");
        Ok(Authorizer::new(Arc::from(driver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert_eq!(DriverRegistry::builtin().names(), vec!["openfga", "rbac", "tls"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = DriverRegistry::builtin();
        let err = registry
            .register("tls", || -> Box<dyn Driver> { Box::new(TlsDriver::default()) })
            .unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(_)));

        registry
            .register("tls-copy", || -> Box<dyn Driver> { Box::new(TlsDriver::default()) })
            .unwrap();
        assert!(registry.contains("tls-copy"));
    }

    #[tokio::test]
    async fn test_unknown_driver() {
        let err = DriverRegistry::new()
            .load_authorizer("nope", LoadOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownDriver(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_load_failure_is_wrapped() {
        let err = DriverRegistry::builtin()
            .load_authorizer("tls", LoadOptions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to load authorization driver \"tls\""));
        assert!(matches!(err.root(), AuthzError::Configuration(_)));
    }
}
