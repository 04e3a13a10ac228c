//! stratus-provider — cluster resource lifecycle.
//!
//! Turns a declarative [`ClusterSpec`] into a deployed cluster and keeps the
//! two in step afterwards:
//!
//! - **create** — resource group, generated deployment, stored api model
//! - **read** — stored model projected into a [`ClusterState`], kubeconfig included
//! - **update** — Kubernetes upgrade, then per-pool scaling, then tags
//! - **delete** — resource group removal; already gone counts as deleted
//! - **import** — adopt an existing cluster from its api model

pub mod cluster;
pub mod collaborators;
pub mod error;
pub mod spec;
pub mod upgrade;

#[cfg(test)]
mod testing;

pub use cluster::{ClusterResource, ClusterState, ProviderServices, import_cluster, read_cluster};
pub use collaborators::{ClusterUpgrader, ResourceGroups};
pub use error::{ProviderError, ProviderResult};
pub use spec::{AgentPoolSpec, ClusterSpec, LinuxSpec, MasterSpec, ServicePrincipalSpec};
pub use upgrade::validate_upgrade;
