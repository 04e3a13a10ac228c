//! Seams to the systems the scale path drives but does not implement.
//!
//! Every collaborator is injected as a trait object so the driver can be
//! exercised end to end against in-memory fakes. Async methods return
//! boxed `Send` futures so the traits stay object safe.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratus_core::{ClusterModel, KeyvaultSecretRef, KubeConfig, WINDOWS_PUBLISHER};
use stratus_template::{ArtifactFormat, DeploymentParameters, DeploymentTemplate, RenderedArtifacts};
use thiserror::Error;

/// Boxed future alias for collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque error raised by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by the cloud control plane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

// ── Credentials ───────────────────────────────────────────────────

/// Service principal credentials for one subscription.
#[derive(Clone)]
pub struct CloudCredentials {
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Reads secrets out of a key vault.
pub trait SecretResolver: Send + Sync {
    fn resolve<'a>(&'a self, reference: &'a KeyvaultSecretRef) -> BoxFuture<'a, Result<String, BoxError>>;
}

/// Builds an authenticated cloud client.
pub trait CloudConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        credentials: &'a CloudCredentials,
    ) -> BoxFuture<'a, Result<Arc<dyn CloudClient>, CloudError>>;
}

// ── Compute and deployments ───────────────────────────────────────

/// A virtual machine as listed by the compute API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub image_publisher: Option<String>,
}

/// A virtual machine scale set as listed by the compute API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleSet {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub capacity: u32,
    #[serde(default)]
    pub image_publisher: Option<String>,
}

/// True when the image publisher marks a Windows node.
pub fn is_windows_publisher(publisher: Option<&str>) -> bool {
    publisher.is_some_and(|p| p.eq_ignore_ascii_case(WINDOWS_PUBLISHER))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHandle {
    pub name: String,
    pub provisioning_state: String,
}

/// Authenticated access to compute and deployment APIs.
pub trait CloudClient: Send + Sync {
    fn list_virtual_machines<'a>(
        &'a self,
        resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<VirtualMachine>, CloudError>>;

    fn list_scale_sets<'a>(
        &'a self,
        resource_group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ScaleSet>, CloudError>>;

    /// Delete a VM together with its NIC and disks.
    fn delete_virtual_machine<'a>(
        &'a self,
        subscription_id: &'a str,
        resource_group: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(), CloudError>>;

    /// Submit a deployment and wait for the provider to accept or reject it.
    fn deploy_template<'a>(
        &'a self,
        resource_group: &'a str,
        deployment_name: &'a str,
        template: &'a DeploymentTemplate,
        parameters: &'a DeploymentParameters,
    ) -> BoxFuture<'a, Result<DeploymentHandle, CloudError>>;
}

// ── Templates and nodes ───────────────────────────────────────────

/// Renders a cluster model into a deployment template/parameter pair.
pub trait ArtifactGenerator: Send + Sync {
    fn generate(
        &self,
        model: &ClusterModel,
        format: ArtifactFormat,
    ) -> Result<RenderedArtifacts, BoxError>;
}

/// Cordons and drains nodes through the cluster's API server.
pub trait NodeDrainer: Send + Sync {
    /// Drain every node in `nodes`; returns once all are drained or any fails.
    fn drain<'a>(
        &'a self,
        kubeconfig: &'a KubeConfig,
        nodes: &'a [String],
        grace_period: Duration,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}
