//! Entity lifecycle hooks.
//!
//! The rest of the daemon calls these whenever an entity is created, deleted
//! or renamed so that drivers which keep their own state (the remote resource
//! map, persisted hierarchy tuples) stay consistent with it. Every per-kind
//! hook defaults to building the entity's [`Object`] and calling one of
//! [`object_added`](EntityHooks::object_added),
//! [`object_removed`](EntityHooks::object_removed) or
//! [`object_renamed`](EntityHooks::object_renamed), which default to no-ops.

use async_trait::async_trait;
use warden_core::{AuthzResult, Object};

/// Lifecycle hooks every driver exposes.
#[async_trait]
pub trait EntityHooks: Send + Sync {
    /// An entity was created.
    async fn object_added(&self, _object: &Object) -> AuthzResult<()> {
        Ok(())
    }

    /// An entity was deleted.
    async fn object_removed(&self, _object: &Object) -> AuthzResult<()> {
        Ok(())
    }

    /// An entity was renamed.
    async fn object_renamed(&self, _old: &Object, _new: &Object) -> AuthzResult<()> {
        Ok(())
    }

    /// A project was created. `id` is the project's stable identifier.
    async fn add_project(&self, _id: i64, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::project_named(name)?).await
    }

    /// A project was deleted.
    async fn delete_project(&self, _id: i64, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::project_named(name)?).await
    }

    /// A project was renamed.
    async fn rename_project(&self, _id: i64, old_name: &str, new_name: &str) -> AuthzResult<()> {
        self.object_renamed(&Object::project_named(old_name)?, &Object::project_named(new_name)?)
            .await
    }

    /// A certificate was trusted.
    async fn add_certificate(&self, fingerprint: &str) -> AuthzResult<()> {
        self.object_added(&Object::certificate(fingerprint)?).await
    }

    /// A certificate was removed from the trust store.
    async fn delete_certificate(&self, fingerprint: &str) -> AuthzResult<()> {
        self.object_removed(&Object::certificate(fingerprint)?).await
    }

    /// A storage pool was created.
    async fn add_storage_pool(&self, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::storage_pool(name)?).await
    }

    /// A storage pool was deleted.
    async fn delete_storage_pool(&self, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::storage_pool(name)?).await
    }

    /// An image was created.
    async fn add_image(&self, project: &str, fingerprint: &str) -> AuthzResult<()> {
        self.object_added(&Object::image(project, fingerprint)?).await
    }

    /// An image was deleted.
    async fn delete_image(&self, project: &str, fingerprint: &str) -> AuthzResult<()> {
        self.object_removed(&Object::image(project, fingerprint)?).await
    }

    /// An image alias was created.
    async fn add_image_alias(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::image_alias(project, name)?).await
    }

    /// An image alias was deleted.
    async fn delete_image_alias(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::image_alias(project, name)?).await
    }

    /// An image alias was renamed.
    async fn rename_image_alias(
        &self,
        project: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::image_alias(project, old_name)?,
            &Object::image_alias(project, new_name)?,
        )
        .await
    }

    /// An instance was created.
    async fn add_instance(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::instance(project, name)?).await
    }

    /// An instance was deleted.
    async fn delete_instance(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::instance(project, name)?).await
    }

    /// An instance was renamed.
    async fn rename_instance(
        &self,
        project: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::instance(project, old_name)?,
            &Object::instance(project, new_name)?,
        )
        .await
    }

    /// A network was created.
    async fn add_network(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::network(project, name)?).await
    }

    /// A network was deleted.
    async fn delete_network(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::network(project, name)?).await
    }

    /// A network was renamed.
    async fn rename_network(
        &self,
        project: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::network(project, old_name)?,
            &Object::network(project, new_name)?,
        )
        .await
    }

    /// A network zone was created.
    async fn add_network_zone(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::network_zone(project, name)?).await
    }

    /// A network zone was deleted.
    async fn delete_network_zone(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::network_zone(project, name)?).await
    }

    /// A network ACL was created.
    async fn add_network_acl(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::network_acl(project, name)?).await
    }

    /// A network ACL was deleted.
    async fn delete_network_acl(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::network_acl(project, name)?).await
    }

    /// A network ACL was renamed.
    async fn rename_network_acl(
        &self,
        project: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::network_acl(project, old_name)?,
            &Object::network_acl(project, new_name)?,
        )
        .await
    }

    /// A profile was created.
    async fn add_profile(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::profile(project, name)?).await
    }

    /// A profile was deleted.
    async fn delete_profile(&self, project: &str, name: &str) -> AuthzResult<()> {
        self.object_removed(&Object::profile(project, name)?).await
    }

    /// A profile was renamed.
    async fn rename_profile(
        &self,
        project: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::profile(project, old_name)?,
            &Object::profile(project, new_name)?,
        )
        .await
    }

    /// A storage volume was created.
    async fn add_storage_volume(
        &self,
        project: &str,
        pool: &str,
        volume_type: &str,
        name: &str,
    ) -> AuthzResult<()> {
        self.object_added(&Object::storage_volume(project, pool, volume_type, name)?)
            .await
    }

    /// A storage volume was deleted.
    async fn delete_storage_volume(
        &self,
        project: &str,
        pool: &str,
        volume_type: &str,
        name: &str,
    ) -> AuthzResult<()> {
        self.object_removed(&Object::storage_volume(project, pool, volume_type, name)?)
            .await
    }

    /// A storage volume was renamed.
    async fn rename_storage_volume(
        &self,
        project: &str,
        pool: &str,
        volume_type: &str,
        old_name: &str,
        new_name: &str,
    ) -> AuthzResult<()> {
        self.object_renamed(
            &Object::storage_volume(project, pool, volume_type, old_name)?,
            &Object::storage_volume(project, pool, volume_type, new_name)?,
        )
        .await
    }

    /// A storage bucket was created.
    async fn add_storage_bucket(&self, project: &str, pool: &str, name: &str) -> AuthzResult<()> {
        self.object_added(&Object::storage_bucket(project, pool, name)?)
            .await
    }

    /// A storage bucket was deleted.
    async fn delete_storage_bucket(
        &self,
        project: &str,
        pool: &str,
        name: &str,
    ) -> AuthzResult<()> {
        self.object_removed(&Object::storage_bucket(project, pool, name)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EntityHooks for Recorder {
        async fn object_added(&self, object: &Object) -> AuthzResult<()> {
            self.events.lock().push(format!("add {object}"));
            Ok(())
        }

        async fn object_removed(&self, object: &Object) -> AuthzResult<()> {
            self.events.lock().push(format!("remove {object}"));
            Ok(())
        }

        async fn object_renamed(&self, old: &Object, new: &Object) -> AuthzResult<()> {
            self.events.lock().push(format!("rename {old} {new}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_defaults_route_to_generic_hooks() {
        let recorder = Recorder::default();
        recorder.add_project(1, "p1").await.unwrap();
        recorder.add_instance("p1", "c1").await.unwrap();
        recorder.rename_instance("p1", "c1", "c2").await.unwrap();
        recorder
            .delete_storage_volume("p1", "pool0", "custom", "v/1")
            .await
            .unwrap();

        assert_eq!(
            *recorder.events.lock(),
            vec![
                "add project:p1".to_string(),
                "add instance:p1/c1".to_string(),
                "rename instance:p1/c1 instance:p1/c2".to_string(),
                "remove storage_volume:p1/pool0/custom/v%2F1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_entity_is_rejected() {
        let recorder = Recorder::default();
        let err = recorder.add_instance("", "c1").await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(recorder.events.lock().is_empty());
    }
}
