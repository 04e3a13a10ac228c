//! Lifecycle collaborators beyond those the scale path already uses.

use std::collections::BTreeMap;

use stratus_core::ClusterModel;
use stratus_scale::{BoxError, BoxFuture, CloudError};

/// Resource group management.
pub trait ResourceGroups: Send + Sync {
    fn create<'a>(
        &'a self,
        name: &'a str,
        location: &'a str,
        tags: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), CloudError>>;

    /// Delete the group and everything in it, waiting for completion.
    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), CloudError>>;

    fn update_tags<'a>(
        &'a self,
        name: &'a str,
        tags: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), CloudError>>;
}

/// Rolls a cluster's control plane and nodes to a new Kubernetes version.
pub trait ClusterUpgrader: Send + Sync {
    /// Returns the model as it stands after the upgrade.
    fn upgrade<'a>(
        &'a self,
        model: &'a ClusterModel,
        resource_group: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, Result<ClusterModel, BoxError>>;
}
